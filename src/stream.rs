pub mod sse;

use crate::snapshot::StatusSnapshot;
use reqwest::{
    blocking::Client,
    header::{ACCEPT, CACHE_CONTROL},
};
use sse::SseDecoder;
use std::{
    io::{BufRead, BufReader},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

/// Ready state shared between the stream owner, its listener thread and any
/// armed reconnect timer.
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    pub fn new(state: ReadyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ReadyState {
        match self.0.load(Ordering::SeqCst) {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }

    pub fn set(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub enum StreamEvent {
    Opened,
    Snapshot(StatusSnapshot),
    Error(String),
}

/// Fires one reconnect signal after a fixed delay, if the stream is still
/// closed by then.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectTimer {
    delay: Duration,
}

impl ReconnectTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn arm(&self, state: Arc<SharedState>, signal: Sender<()>) -> JoinHandle<()> {
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            if state.get() == ReadyState::Closed {
                tracing::info!("Attempting to reconnect status stream...");
                let _ = signal.send(());
            } else {
                tracing::debug!("Stream no longer closed when timer fired, skipping reconnect.");
            }
        })
    }
}

/// Long-lived status feed from `/api/stream`.
///
/// The listener thread never retries on its own: every failure closes the
/// stream and arms a [`ReconnectTimer`]. The owner polls
/// [`try_reconnect_signal`](Self::try_reconnect_signal) and calls
/// [`reconnect`](Self::reconnect), which keeps retrying forever at the same
/// fixed delay.
pub struct StatusStream {
    url: String,
    client: Client,
    state: Arc<SharedState>,
    generation: Arc<AtomicU64>,
    event_tx: Sender<StreamEvent>,
    event_rx: Receiver<StreamEvent>,
    reconnect_tx: Sender<()>,
    reconnect_rx: Receiver<()>,
    timer: ReconnectTimer,
}

impl StatusStream {
    /// Create the stream and start the first connection attempt.
    pub fn open(client: Client, url: &str, reconnect_delay: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let (reconnect_tx, reconnect_rx) = mpsc::channel();
        let mut stream = Self {
            url: url.into(),
            client,
            state: Arc::new(SharedState::new(ReadyState::Closed)),
            generation: Arc::new(AtomicU64::new(0)),
            event_tx,
            event_rx,
            reconnect_tx,
            reconnect_rx,
            timer: ReconnectTimer::new(reconnect_delay),
        };
        stream.connect();
        stream
    }

    fn connect(&mut self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.set(ReadyState::Connecting);
        tracing::debug!(generation, url = %self.url, "Opening status stream.");

        let listener = Listener {
            url: self.url.clone(),
            client: self.client.clone(),
            generation,
            current: Arc::clone(&self.generation),
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            reconnect_tx: self.reconnect_tx.clone(),
            timer: self.timer,
        };
        thread::spawn(move || listener.run());
    }

    /// Drop the current connection. Its listener thread stops delivering
    /// events as soon as it wakes up.
    pub fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.set(ReadyState::Closed);
    }

    pub fn reconnect(&mut self) {
        self.close();
        self.connect();
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    pub fn try_recv_event(&self) -> Result<StreamEvent, TryRecvError> {
        self.event_rx.try_recv()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Result<StreamEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    pub fn try_reconnect_signal(&self) -> Result<(), TryRecvError> {
        self.reconnect_rx.try_recv()
    }
}

impl Drop for StatusStream {
    fn drop(&mut self) {
        self.close();
    }
}

struct Listener {
    url: String,
    client: Client,
    generation: u64,
    current: Arc<AtomicU64>,
    state: Arc<SharedState>,
    event_tx: Sender<StreamEvent>,
    reconnect_tx: Sender<()>,
    timer: ReconnectTimer,
}

impl Listener {
    fn run(self) {
        let span = tracing::info_span!("listener", generation = self.generation);
        let _enter = span.enter();

        let response = match self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
        {
            Ok(response) => response,
            Err(e) => return self.fail(e.to_string()),
        };
        if !response.status().is_success() {
            return self.fail(format!("server responded with HTTP {}", response.status()));
        }
        if !self.is_current() {
            return;
        }

        self.state.set(ReadyState::Open);
        tracing::info!("Status stream opened.");
        self.send(StreamEvent::Opened);

        let mut reader = BufReader::new(response);
        let mut decoder = SseDecoder::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return self.fail("stream closed by server".into()),
                Ok(_) => {}
                Err(e) => return self.fail(e.to_string()),
            }
            if !self.is_current() {
                tracing::debug!("Stale listener exiting.");
                return;
            }
            // Invalid UTF-8 only spoils the message it belongs to.
            let line = String::from_utf8_lossy(&buf);
            let Some(event) = decoder.push_line(&line) else {
                continue;
            };
            if !event.is_message() {
                tracing::debug!(event = ?event.event, "Skipping non-message event.");
                continue;
            }
            tracing::debug!(event = ?event.event, id = ?event.id, "Raw status message: {}", event.data);
            match StatusSnapshot::parse(&event.data) {
                Ok(snapshot) => self.send(StreamEvent::Snapshot(snapshot)),
                Err(e) => tracing::error!("Error parsing status message: {}", e),
            }
        }
    }

    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn send(&self, event: StreamEvent) {
        if self.is_current() {
            let _ = self.event_tx.send(event);
        }
    }

    fn fail(&self, reason: String) {
        if !self.is_current() {
            return;
        }
        tracing::error!("Status stream connection error: {}", reason);
        self.state.set(ReadyState::Closed);
        self.send(StreamEvent::Error(reason));
        self.timer.arm(Arc::clone(&self.state), self.reconnect_tx.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{closed_port_url, serve_once, test_client};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn timer_fires_once_when_closed() {
        let state = Arc::new(SharedState::new(ReadyState::Closed));
        let (tx, rx) = mpsc::channel();
        ReconnectTimer::new(Duration::from_millis(20)).arm(state, tx).join().unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn timer_skips_when_not_closed() {
        let state = Arc::new(SharedState::new(ReadyState::Closed));
        let (tx, rx) = mpsc::channel();
        let handle = ReconnectTimer::new(Duration::from_millis(50)).arm(Arc::clone(&state), tx);
        state.set(ReadyState::Connecting);
        handle.join().unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delivers_snapshots_and_drops_malformed() {
        let (base, _server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             data: {\"running\": true, \"hashrate\": 2000, \"balance\": 0.5}\n\n\
             data: not json\n\n\
             : ping\n\n\
             data: {\"hashrate\": 3}\n\n"
                .to_string(),
        );
        let stream = StatusStream::open(test_client(), &format!("{}/api/stream", base), Duration::from_millis(20));

        assert!(matches!(stream.recv_event_timeout(WAIT), Ok(StreamEvent::Opened)));
        match stream.recv_event_timeout(WAIT) {
            Ok(StreamEvent::Snapshot(snap)) => {
                assert!(snap.running);
                assert_eq!(snap.hashrate, 2000.0);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        match stream.recv_event_timeout(WAIT) {
            Ok(StreamEvent::Snapshot(snap)) => {
                assert_eq!(snap.hashrate, 3.0);
                assert!(!snap.running);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert!(matches!(stream.recv_event_timeout(WAIT), Ok(StreamEvent::Error(_))));
        assert_eq!(stream.ready_state(), ReadyState::Closed);
    }

    fn event_stream(body: &[u8]) -> Vec<u8> {
        let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(body);
        response
    }

    fn next_snapshot(stream: &StatusStream) -> StatusSnapshot {
        match stream.recv_event_timeout(WAIT) {
            Ok(StreamEvent::Snapshot(snap)) => snap,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn invalid_utf8_message_is_dropped_and_stream_stays_open() {
        let (base, _server) = serve_once(event_stream(
            b"data: {\"hashrate\": \xff\xfe}\n\n\
              data: {\"hashrate\": 7}\n\n",
        ));
        let stream = StatusStream::open(test_client(), &base, Duration::from_secs(60));

        assert!(matches!(stream.recv_event_timeout(WAIT), Ok(StreamEvent::Opened)));
        assert_eq!(next_snapshot(&stream).hashrate, 7.0);
    }

    #[test]
    fn named_events_are_not_status_messages() {
        let (base, _server) = serve_once(event_stream(
            b"event: heartbeat\ndata: {\"hashrate\": 5}\n\n\
              event: message\ndata: {\"hashrate\": 9}\n\n\
              data: {\"hashrate\": 11}\n\n",
        ));
        let stream = StatusStream::open(test_client(), &base, Duration::from_secs(60));

        assert!(matches!(stream.recv_event_timeout(WAIT), Ok(StreamEvent::Opened)));
        assert_eq!(next_snapshot(&stream).hashrate, 9.0);
        assert_eq!(next_snapshot(&stream).hashrate, 11.0);
    }

    #[test]
    fn connect_failure_schedules_one_reconnect() {
        let stream = StatusStream::open(test_client(), &closed_port_url(), Duration::from_millis(20));

        assert!(matches!(stream.recv_event_timeout(WAIT), Ok(StreamEvent::Error(_))));
        let deadline = std::time::Instant::now() + WAIT;
        while stream.try_reconnect_signal().is_err() {
            assert!(std::time::Instant::now() < deadline, "no reconnect signal");
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(100));
        assert!(stream.try_reconnect_signal().is_err());
    }

    #[test]
    fn http_error_status_closes_stream() {
        let (base, _server) = serve_once(crate::testutil::http_response("503 Service Unavailable", "text/plain", "busy"));
        let stream = StatusStream::open(test_client(), &base, Duration::from_secs(60));

        match stream.recv_event_timeout(WAIT) {
            Ok(StreamEvent::Error(reason)) => assert!(reason.contains("503")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(stream.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn close_marks_closed() {
        let stream = StatusStream::open(test_client(), &closed_port_url(), Duration::from_secs(60));
        stream.close();
        assert_eq!(stream.ready_state(), ReadyState::Closed);
    }
}
