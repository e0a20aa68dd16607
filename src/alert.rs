use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::Error => "❌",
            Self::Warning => "⚠️",
            Self::Info => "ℹ️",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self { severity, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Single-slot notification area. At most one alert is visible; it goes away
/// on dismissal or once its time to live has passed.
#[derive(Debug)]
pub struct Notifier {
    slot: Option<(Alert, Instant)>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { slot: None, ttl }
    }

    pub fn show(&mut self, alert: Alert) {
        self.show_at(alert, Instant::now());
    }

    pub fn show_at(&mut self, alert: Alert, now: Instant) {
        tracing::debug!(severity = ?alert.severity, "alert: {}", alert.message);
        self.slot = Some((alert, now));
    }

    pub fn dismiss(&mut self) {
        self.slot = None;
    }

    /// Drop the alert if it has outlived its time to live.
    pub fn expire(&mut self, now: Instant) {
        if let Some((_, shown_at)) = &self.slot {
            if now.saturating_duration_since(*shown_at) >= self.ttl {
                self.slot = None;
            }
        }
    }

    pub fn current(&self) -> Option<&Alert> {
        self.slot.as_ref().map(|(alert, _)| alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ALERT_TTL;

    #[test]
    fn second_alert_replaces_first() {
        let mut notifier = Notifier::new(ALERT_TTL);
        notifier.show(Alert::error("first"));
        notifier.show(Alert::success("second"));

        let current = notifier.current().unwrap();
        assert_eq!(current.message, "second");
        assert_eq!(current.severity, Severity::Success);
    }

    #[test]
    fn expires_after_ttl() {
        let mut notifier = Notifier::new(ALERT_TTL);
        let shown = Instant::now();
        notifier.show_at(Alert::error("boom"), shown);

        notifier.expire(shown + Duration::from_millis(4_999));
        assert!(notifier.current().is_some());
        notifier.expire(shown + ALERT_TTL);
        assert!(notifier.current().is_none());
    }

    #[test]
    fn replacement_restarts_the_clock() {
        let mut notifier = Notifier::new(ALERT_TTL);
        let start = Instant::now();
        notifier.show_at(Alert::error("old"), start);
        notifier.show_at(Alert::error("new"), start + Duration::from_secs(4));

        notifier.expire(start + Duration::from_secs(6));
        assert_eq!(notifier.current().map(|a| a.message.as_str()), Some("new"));
    }

    #[test]
    fn dismiss_clears_slot() {
        let mut notifier = Notifier::new(ALERT_TTL);
        notifier.show(Alert::new(Severity::Warning, "careful"));
        notifier.dismiss();
        assert!(notifier.current().is_none());
    }

    #[test]
    fn severity_icons() {
        assert_eq!(Severity::default().icon(), "ℹ️");
        assert_eq!(Severity::Error.icon(), "❌");
    }
}
