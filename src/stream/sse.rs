/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Line-oriented `text/event-stream` decoder.
///
/// Feed it lines as read from the wire; it yields an event on each blank line
/// that closes a block containing at least one `data:` field.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseEvent {
    /// Only unnamed events (or ones explicitly named `message`) carry status.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("") | Some("message"))
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // Reconnection delay is fixed on our side.
            "retry" => {}
            other => tracing::debug!("ignoring unknown SSE field: {}", other),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            id: self.id.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut SseDecoder, raw: &str) -> Vec<SseEvent> {
        raw.split_inclusive('\n')
            .filter_map(|line| decoder.push_line(line))
            .collect()
    }

    #[test]
    fn single_data_event() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, "data: {\"running\": true}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"running\": true}");
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, "data: {\"hashrate\":\ndata: 12}\n\n");
        assert_eq!(events[0].data, "{\"hashrate\":\n12}");
    }

    #[test]
    fn comments_and_crlf() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, ": keep-alive\r\n\r\nevent: status\r\nid: 7\r\ndata:{}\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent { event: Some("status".into()), id: Some("7".into()), data: "{}".into() }]
        );
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(feed(&mut decoder, "retry: 10000\n\n\n").is_empty());
    }

    #[test]
    fn unterminated_block_is_held() {
        let mut decoder = SseDecoder::new();
        assert!(feed(&mut decoder, "data: {}\n").is_empty());
        assert_eq!(decoder.push_line("\n").map(|e| e.data), Some("{}".to_string()));
    }

    #[test]
    fn only_default_events_are_messages() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, "data: a\n\nevent: message\ndata: b\n\nevent: ping\ndata: c\n\n");
        let kinds: Vec<bool> = events.iter().map(SseEvent::is_message).collect();
        assert_eq!(kinds, vec![true, true, false]);
    }
}
