mod dispatch;

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex;

use crate::pty::PtyHandle;
use dispatch::dispatch;

/// Where the control server listens. Exactly one endpoint kind is
/// configured per server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

enum BoundListener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// Accepts control requests and applies them to the PTY.
///
/// `bind()` must run before `run()`; the listener is held in between so the
/// child can be spawned only after the endpoint is known to be ours.
pub struct ControlServer {
    endpoint: Endpoint,
    listener: Option<BoundListener>,
}

impl ControlServer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            listener: None,
        }
    }

    /// Bind the configured endpoint. A stale socket file left behind by a
    /// previous run is removed before binding.
    pub async fn bind(&mut self) -> anyhow::Result<()> {
        let listener = match &self.endpoint {
            Endpoint::Unix(path) => {
                if let Err(err) = std::fs::remove_file(path) {
                    if err.kind() != io::ErrorKind::NotFound {
                        return Err(err).with_context(|| {
                            format!("failed to remove stale socket {}", path.display())
                        });
                    }
                }
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("failed to bind {}", path.display()))?;
                BoundListener::Unix(listener)
            }
            Endpoint::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .with_context(|| format!("failed to bind {host}:{port}"))?;
                BoundListener::Tcp(listener)
            }
        };
        tracing::info!(endpoint = %self.endpoint, "control server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Serve control requests until `shutdown` resolves, then let axum
    /// drain in-flight connections.
    pub async fn run<F>(self, pty: PtyHandle, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("bind() must be called before run()"))?;
        let app = build_router(pty);
        match listener {
            BoundListener::Unix(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
            BoundListener::Tcp(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
struct ControlState {
    pty: PtyHandle,
    // One lock for every dispatch: commands mutate the PTY in the order
    // their requests were accepted, never interleaved.
    gate: Arc<Mutex<()>>,
}

pub fn build_router(pty: PtyHandle) -> Router {
    let state = ControlState {
        pty,
        gate: Arc::new(Mutex::new(())),
    };
    Router::new().fallback(handle_request).with_state(state)
}

/// Single entry point for every control request. The response is written
/// only after the dispatched operation has settled.
async fn handle_request(State(state): State<ControlState>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let result = {
        let _guard = state.gate.lock().await;
        dispatch(&state.pty, req).await
    };
    match result {
        Ok(()) => {
            tracing::debug!(%method, %path, "request ok");
            (StatusCode::OK, Json(json!({ "code": 0 }))).into_response()
        }
        Err(err) => {
            tracing::warn!(%method, %path, error = %err, "request failed");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": -1, "message": err.to_string() })),
            )
                .into_response()
        }
    }
}
