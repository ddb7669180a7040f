use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use portable_pty::{MasterPty, PtySize};
use thiserror::Error;

use crate::pty::relay::OutputRelay;
use crate::pty::signal::Signal;

/// Escape sequence relayed by `clear()`: cursor home, erase display, erase
/// scrollback. The downstream terminal discards its scrollback, which is
/// the closest equivalent this relay-only server has to a buffer reset.
const CLEAR_SEQUENCE: &[u8] = b"\x1b[H\x1b[2J\x1b[3J";

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("pty process has already exited")]
    Dead,
    #[error("cols and rows must be positive")]
    InvalidSize,
    #[error("unknown signal: {0}")]
    UnknownSignal(String),
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Kill {
        signal: &'static str,
        pid: u32,
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Backend(String),
}

/// Control surface for one spawned PTY-backed process.
///
/// Cheap to clone; all clones share the same underlying process. Once the
/// process exits, every operation fails with [`PtyError::Dead`] rather than
/// silently doing nothing.
#[derive(Clone)]
pub struct PtyHandle {
    pid: u32,
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    writer: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
    relay: Arc<Mutex<OutputRelay>>,
    alive: Arc<AtomicBool>,
}

impl PtyHandle {
    pub(crate) fn new(
        pid: u32,
        master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
        writer: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
        relay: Arc<Mutex<OutputRelay>>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pid,
            master,
            writer,
            relay,
            alive,
        }
    }

    /// Drop the input writer so its fd closes. Called by the session once
    /// the child has exited; writes racing the exit fail instead of going
    /// to a dead process.
    pub(crate) fn close_writer(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            *writer = None;
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> Result<(), PtyError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(PtyError::Dead)
        }
    }

    /// Enqueue bytes on the PTY's input side. Byte order is preserved and
    /// partial writes are completed before returning.
    pub fn write(&self, bytes: &[u8]) -> Result<(), PtyError> {
        self.ensure_alive()?;
        if bytes.is_empty() {
            return Ok(());
        }
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "input writer lock poisoned"))?;
        let Some(writer) = writer.as_mut() else {
            return Err(PtyError::Dead);
        };
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.ensure_alive()?;
        if cols == 0 || rows == 0 {
            return Err(PtyError::InvalidSize);
        }
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        let master = self
            .master
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "master lock poisoned"))?;
        master
            .resize(size)
            .map_err(|err| PtyError::Backend(err.to_string()))?;
        Ok(())
    }

    /// Relay a scrollback-erase sequence downstream. Goes through the relay
    /// so a clear issued while paused stays ordered with buffered output.
    pub fn clear(&self) -> Result<(), PtyError> {
        self.ensure_alive()?;
        let mut relay = self
            .relay
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "relay lock poisoned"))?;
        relay.deliver(CLEAR_SEQUENCE)?;
        Ok(())
    }

    /// Suspend output delivery. Idempotent; output produced while paused is
    /// buffered, never dropped.
    pub fn pause(&self) -> Result<(), PtyError> {
        self.ensure_alive()?;
        let mut relay = self
            .relay
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "relay lock poisoned"))?;
        relay.pause();
        Ok(())
    }

    /// Resume output delivery, flushing anything buffered while paused.
    /// Idempotent.
    pub fn resume(&self) -> Result<(), PtyError> {
        self.ensure_alive()?;
        let mut relay = self
            .relay
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "relay lock poisoned"))?;
        relay.resume()?;
        Ok(())
    }

    /// Send a termination signal to the process. Defaults to SIGHUP when no
    /// name is given. Exit is observed asynchronously through the session's
    /// exit watch, not here.
    pub fn kill(&self, signal: Option<&str>) -> Result<(), PtyError> {
        self.ensure_alive()?;
        let signal = match signal {
            Some(name) => {
                Signal::from_name(name).ok_or_else(|| PtyError::UnknownSignal(name.to_string()))?
            }
            None => Signal::Hup,
        };
        tracing::debug!(pid = self.pid, signal = signal.name(), "signaling pty process");
        signal.send(self.pid)
    }
}
