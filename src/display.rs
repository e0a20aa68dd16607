use crate::{
    alert::{Alert, Severity},
    snapshot::StatusSnapshot,
};
use owo_colors::OwoColorize;

const HASH_RATE_UNITS: [(f64, &str); 5] = [
    (1e12, "Th/s"),
    (1e9, "Gh/s"),
    (1e6, "Mh/s"),
    (1e3, "Kh/s"),
    (1.0, "H/s"),
];

pub struct Display;

impl Display {
    pub fn banner() {
        println!();
        println!("{}", "╔═══════════════════════════════════════════════════════════════╗".cyan());
        println!("{}  MineDash v0.1.0 - Mining Backend Dashboard  {}", "║".cyan(), "║".cyan());
        println!("{}  Live status, control and withdrawals  {}", "║".cyan(), "║".cyan());
        println!("{}", "╚═══════════════════════════════════════════════════════════════╝".cyan());
        println!();
    }

    pub fn connection_info(backend: &str) {
        println!("{} {}", "🔗".cyan(), "Connection Details".bold());
        println!("  {} Backend: {}", "├".black(), backend.yellow());
        println!("  {} Stream: {}", "└".black(), "connecting...".blue());
        println!();
    }

    pub fn status_line(snapshot: &StatusSnapshot) {
        let indicator = if snapshot.running {
            format!("● {}", Self::status_label(true)).green().bold().to_string()
        } else {
            format!("○ {}", Self::status_label(false)).red().to_string()
        };
        println!(
            "{} Hash Rate: {} {} Balance: {} {} {}",
            "⛏".yellow(),
            Self::format_hash_rate(snapshot.hashrate).green().bold(),
            "│".black(),
            Self::format_balance(snapshot.balance).cyan(),
            "│".black(),
            indicator
        );
    }

    pub fn alert(alert: &Alert) {
        let line = format!("{} {}", alert.severity.icon(), alert.message);
        match alert.severity {
            Severity::Success => println!("{}", line.green().bold()),
            Severity::Error => println!("{}", line.red().bold()),
            Severity::Warning => println!("{}", line.yellow()),
            Severity::Info => println!("{}", line.blue()),
        }
    }

    pub fn stream_lost(reason: &str) {
        println!("{} Connection lost: {}. Reconnecting shortly...", "⚠️".red(), reason);
    }

    pub fn stream_opened() {
        println!("{} {}", "✅".green(), "Status stream connected.".green());
    }

    /// Scale a hash rate to the largest unit it reaches. Whole values print
    /// without decimals, anything else with two.
    pub fn format_hash_rate(rate: f64) -> String {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
        let (unit, suffix) = HASH_RATE_UNITS
            .iter()
            .copied()
            .find(|(unit, _)| rate >= *unit)
            .unwrap_or((1.0, "H/s"));
        let scaled = rate / unit;
        if scaled.fract() == 0.0 {
            format!("{:.0}{}", scaled, suffix)
        } else {
            format!("{:.2}{}", scaled, suffix)
        }
    }

    /// Balances always carry satoshi precision.
    pub fn format_balance(balance: f64) -> String {
        format!("{:.8}", balance)
    }

    pub fn status_label(running: bool) -> &'static str {
        if running {
            "Mining Active"
        } else {
            "Mining Stopped"
        }
    }

    /// First `len` characters of an identifier, followed by an ellipsis.
    pub fn truncate_id(id: &str, len: usize) -> String {
        let head: String = id.chars().take(len).collect();
        format!("{}...", head)
    }

    pub fn format_timestamp(ts: i64) -> String {
        chrono::DateTime::from_timestamp(ts, 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_rate_picks_largest_unit_reached() {
        assert_eq!(Display::format_hash_rate(0.0), "0H/s");
        assert_eq!(Display::format_hash_rate(999.0), "999H/s");
        assert_eq!(Display::format_hash_rate(1_000.0), "1Kh/s");
        assert_eq!(Display::format_hash_rate(2_500_000.0), "2.50Mh/s");
        assert_eq!(Display::format_hash_rate(3e9), "3Gh/s");
        assert_eq!(Display::format_hash_rate(1.5e12), "1.50Th/s");
        assert_eq!(Display::format_hash_rate(4e15), "4000Th/s");
    }

    #[test]
    fn hash_rate_decimals_only_when_not_whole() {
        assert_eq!(Display::format_hash_rate(12.5), "12.50H/s");
        assert_eq!(Display::format_hash_rate(1_234.0), "1.23Kh/s");
        assert_eq!(Display::format_hash_rate(7_000_000.0), "7Mh/s");
        assert_eq!(Display::format_hash_rate(999_999.0), "1000.00Kh/s");
    }

    #[test]
    fn hash_rate_sanitizes_bad_input() {
        assert_eq!(Display::format_hash_rate(-5.0), "0H/s");
        assert_eq!(Display::format_hash_rate(f64::NAN), "0H/s");
    }

    #[test]
    fn hash_rate_every_unit_boundary() {
        for (unit, suffix) in HASH_RATE_UNITS {
            assert_eq!(Display::format_hash_rate(unit), format!("1{}", suffix));
            assert_eq!(Display::format_hash_rate(unit * 1.25), format!("1.25{}", suffix));
        }
    }

    #[test]
    fn balance_has_eight_decimals() {
        for balance in [0.0, 1.0, 0.1, 0.00000001, 123.456789012, 21_000_000.0] {
            let text = Display::format_balance(balance);
            let (_, frac) = text.split_once('.').unwrap();
            assert_eq!(frac.len(), 8, "{}", text);
        }
        assert_eq!(Display::format_balance(0.00012345), "0.00012345");
    }

    #[test]
    fn truncate_id_is_char_safe() {
        assert_eq!(Display::truncate_id("abcdef1234567890ZZZZ", 16), "abcdef1234567890...");
        assert_eq!(Display::truncate_id("req-99999999", 8), "req-9999...");
        assert_eq!(Display::truncate_id("ab", 8), "ab...");
        assert_eq!(Display::truncate_id("ééééé", 2), "éé...");
    }

    #[test]
    fn status_labels() {
        assert_eq!(Display::status_label(true), "Mining Active");
        assert_eq!(Display::status_label(false), "Mining Stopped");
    }
}
