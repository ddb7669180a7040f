use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use portable_pty::{native_pty_system, ChildKiller};
use tokio::sync::watch;

use crate::pty::handle::{PtyError, PtyHandle};
use crate::pty::relay::OutputRelay;
use crate::pty::spawn_config::SpawnOptions;

/// Terminal event of the child process: fires exactly once through the
/// session's exit watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: i32,
}

/// One spawned PTY child plus the threads that service it: a reader thread
/// feeding output into the relay, and a wait thread that flips liveness and
/// publishes the exit code.
pub struct PtySession {
    handle: PtyHandle,
    exit: watch::Receiver<Option<ExitInfo>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtySession {
    /// Spawn `command args` attached to a fresh PTY.
    ///
    /// Output is forwarded to `sink` through an [`OutputRelay`]. A spawn
    /// failure here is fatal to the caller; there is no server worth
    /// running without a live process behind it.
    pub fn spawn(
        command: &str,
        args: &[String],
        options: &SpawnOptions,
        sink: Box<dyn Write + Send>,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(options.size())
            .map_err(|err| PtyError::Backend(err.to_string()))?;

        let cmd = options.command_builder(command, args)?;
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|err| PtyError::Backend(err.to_string()))?;
        drop(pair.slave);

        let pid = child
            .process_id()
            .ok_or_else(|| PtyError::Backend("spawned process has no pid".to_string()))?;
        let killer = child.clone_killer();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| PtyError::Backend(err.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| PtyError::Backend(err.to_string()))?;
        let master = Arc::new(Mutex::new(pair.master));

        let relay = Arc::new(Mutex::new(OutputRelay::new(sink)));
        let alive = Arc::new(AtomicBool::new(true));
        let writer = Arc::new(Mutex::new(Some(writer)));
        let handle = PtyHandle::new(pid, master, writer, Arc::clone(&relay), Arc::clone(&alive));

        let reader_relay = Arc::clone(&relay);
        thread::spawn(move || {
            let mut reader = reader;
            let mut buffer = [0u8; 8192];
            loop {
                let count = match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(count) => count,
                    Err(_) => break,
                };
                let Ok(mut relay) = reader_relay.lock() else {
                    break;
                };
                if relay.deliver(&buffer[..count]).is_err() {
                    break;
                }
            }
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        let exit_alive = Arc::clone(&alive);
        let exit_handle = handle.clone();
        thread::spawn(move || {
            let info = match child.wait() {
                Ok(status) => ExitInfo {
                    code: status.exit_code() as i32,
                },
                Err(err) => {
                    tracing::warn!(error = %err, "waiting on pty process failed");
                    ExitInfo { code: 1 }
                }
            };
            exit_alive.store(false, Ordering::SeqCst);
            exit_handle.close_writer();
            let _ = exit_tx.send(Some(info));
        });

        tracing::info!(pid, command, "pty spawned");
        Ok(Self {
            handle,
            exit: exit_rx,
            killer,
        })
    }

    pub fn handle(&self) -> PtyHandle {
        self.handle.clone()
    }

    /// Watch that flips from `None` to `Some(ExitInfo)` exactly once, when
    /// the child terminates.
    pub fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit.clone()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if self.handle.is_alive() {
            let _ = self.killer.kill();
        }
    }
}
