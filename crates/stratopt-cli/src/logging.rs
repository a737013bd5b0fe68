use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use std::fs::File;
use std::io;
use std::path::Path;
use tokio::sync::mpsc;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Installs the global subscriber.
///
/// Console output is routed through the UI channel so log lines are printed above the
/// progress bars instead of tearing them. The optional file layer is written directly.
pub fn setup_logging(
    verbosity: u8,
    quiet: bool,
    log_file: Option<&Path>,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<()> {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let console_layer = fmt::layer()
        .with_writer(move || UiWriter::new(ui_sender.clone()))
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer);

    if let Some(path) = log_file {
        let file = File::create(path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber
            .with(file_layer)
            .try_init()
            .map_err(|e| CliError::Other(e.into()))
    } else {
        subscriber.try_init().map_err(|e| CliError::Other(e.into()))
    }
}

/// Buffers one formatted event and hands it to the UI when dropped.
struct UiWriter {
    sender: mpsc::Sender<UiEvent>,
    buffer: Vec<u8>,
}

impl UiWriter {
    fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            buffer: Vec::new(),
        }
    }
}

impl io::Write for UiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UiWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
        // The UI may already be gone during shutdown.
        if let Err(e) = self.sender.try_send(UiEvent::Log(line)) {
            if let UiEvent::Log(line) = e.into_inner() {
                eprintln!("{line}");
            }
        }
    }
}
