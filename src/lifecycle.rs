use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::cli::ServerConfig;
use crate::pty::{ExitInfo, PtySession, Signal};
use crate::server::{ControlServer, Endpoint};

/// How long in-flight requests (and a signaled child) get to finish before
/// the process stops waiting for them.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Where the server is in its life. Requests are only served while
/// `Listening`; the transition into `Draining` happens at most once no
/// matter how many triggers fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Listening = 1,
    Draining = 2,
    Closed = 3,
}

/// What pushed the server out of `Listening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// The child terminated, on its own or via `/kill`.
    ChildExit(ExitInfo),
    /// The hosting process received a termination signal.
    Signal(Signal),
}

/// Shutdown state shared between the exit watcher, the OS signal task, and
/// the serving loop.
pub struct Lifecycle {
    phase: AtomicU8,
    trigger: Mutex<Option<DrainTrigger>>,
    drained: Notify,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
            trigger: Mutex::new(None),
            drained: Notify::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::SeqCst) {
            0 => Phase::Starting,
            1 => Phase::Listening,
            2 => Phase::Draining,
            _ => Phase::Closed,
        }
    }

    pub fn mark_listening(&self) {
        self.phase.store(Phase::Listening as u8, Ordering::SeqCst);
    }

    pub fn mark_closed(&self) {
        self.phase.store(Phase::Closed as u8, Ordering::SeqCst);
    }

    /// Record the drain trigger and leave `Listening`. Returns true for the
    /// first caller only; concurrent or later triggers are no-ops.
    pub fn begin_drain(&self, trigger: DrainTrigger) -> bool {
        let mut slot = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(trigger);
        self.phase.store(Phase::Draining as u8, Ordering::SeqCst);
        drop(slot);
        tracing::info!(?trigger, "draining");
        self.drained.notify_waiters();
        true
    }

    pub fn trigger(&self) -> Option<DrainTrigger> {
        *self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves once the drain transition has happened.
    pub async fn drained(&self) {
        // Subscribe before checking the phase so a begin_drain() racing this
        // call cannot fire notify_waiters() with no subscriber listening.
        let notified = self.drained.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.phase() >= Phase::Draining {
            return;
        }
        notified.await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the whole host as one unit: bind the control endpoint, spawn the
/// child, serve requests, and reconcile the child's exit with the server's
/// shutdown.
///
/// Returns the exit code the hosting process should exit with: the child's
/// own code when its exit was observed, otherwise 0.
pub async fn run(config: ServerConfig) -> anyhow::Result<i32> {
    let lifecycle = Arc::new(Lifecycle::new());

    let mut server = ControlServer::new(config.endpoint.clone());
    server.bind().await?;

    // Spawn only after the listener is bound: a bind failure must never
    // leave an orphaned child behind.
    let session = PtySession::spawn(
        &config.command,
        &config.args,
        &config.options,
        Box::new(io::stdout()),
    )?;
    let pty = session.handle();
    lifecycle.mark_listening();

    let mut exit_rx = session.exit_watch();
    {
        let lifecycle = Arc::clone(&lifecycle);
        let mut exit_rx = exit_rx.clone();
        tokio::spawn(async move {
            if exit_rx.wait_for(|exit| exit.is_some()).await.is_err() {
                return;
            }
            let Some(info) = *exit_rx.borrow() else {
                return;
            };
            tracing::info!(code = info.code, "pty process exited");
            lifecycle.begin_drain(DrainTrigger::ChildExit(info));
        });
    }

    {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            match wait_for_termination().await {
                Ok(signal) => {
                    lifecycle.begin_drain(DrainTrigger::Signal(signal));
                }
                Err(err) => tracing::warn!(error = %err, "signal listener failed"),
            }
        });
    }

    let serve_task = {
        let lifecycle = Arc::clone(&lifecycle);
        let pty = pty.clone();
        tokio::spawn(async move {
            server
                .run(pty, async move { lifecycle.drained().await })
                .await
        })
    };

    lifecycle.drained().await;

    let mut exit_code = 0;
    match lifecycle.trigger() {
        Some(DrainTrigger::ChildExit(info)) => exit_code = info.code,
        Some(DrainTrigger::Signal(signal)) => {
            // Forward the signal so the child can exit cleanly, then wait a
            // bounded time for its real exit code.
            if pty.is_alive() {
                if let Err(err) = pty.kill(Some(signal.name())) {
                    tracing::warn!(error = %err, "failed to forward signal to pty process");
                }
            }
            match tokio::time::timeout(DRAIN_GRACE, exit_rx.wait_for(|exit| exit.is_some())).await
            {
                Ok(Ok(observed)) => {
                    if let Some(info) = *observed {
                        exit_code = info.code;
                    }
                }
                Ok(Err(_)) => {}
                Err(_) => tracing::warn!("pty process did not exit within the grace period"),
            }
        }
        None => {}
    }

    // The graceful-shutdown future has already resolved; give in-flight
    // responses a bounded window, then abandon them.
    match tokio::time::timeout(DRAIN_GRACE, serve_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => tracing::warn!(error = %err, "control server error during shutdown"),
        Ok(Err(err)) => tracing::warn!(error = %err, "control server task failed"),
        Err(_) => tracing::warn!("control server did not drain in time; abandoning connections"),
    }

    if let Endpoint::Unix(path) = &config.endpoint {
        let _ = std::fs::remove_file(path);
    }

    lifecycle.mark_closed();
    tracing::info!(exit_code, "shutdown complete");
    Ok(exit_code)
}

async fn wait_for_termination() -> io::Result<Signal> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        return tokio::select! {
            _ = tokio::signal::ctrl_c() => Ok(Signal::Int),
            _ = sigterm.recv() => Ok(Signal::Term),
        };
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(Signal::Int)
    }
}
