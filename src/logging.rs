use std::{io, sync::mpsc::Sender};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Console modes log to stderr so status lines on stdout stay clean.
pub fn init_console(level: Level) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

/// The dashboard owns the terminal, so log lines go to its log pane instead.
pub fn init_gui(level: Level, log_tx: Sender<String>) {
    tracing_subscriber::fmt()
        .with_writer(ChannelWriter { tx: log_tx })
        .with_ansi(false)
        .with_target(false)
        .with_max_level(level)
        .init();
}

#[derive(Clone)]
struct ChannelWriter {
    tx: Sender<String>,
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = LineSink;

    fn make_writer(&'a self) -> Self::Writer {
        LineSink { tx: self.tx.clone(), buf: Vec::new() }
    }
}

/// Buffers one formatted event and ships it when dropped.
struct LineSink {
    tx: Sender<String>,
    buf: Vec<u8>,
}

impl io::Write for LineSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineSink {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            let _ = self.tx.send(line.to_string());
        }
    }
}
