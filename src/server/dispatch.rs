use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use http_body_util::BodyExt;
use serde::Deserialize;
use thiserror::Error;

use crate::pty::{PtyError, PtyHandle};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("can't parse body for {0} request")]
    BodylessMethod(Method),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read request body: {0}")]
    Body(axum::Error),
    #[error(transparent)]
    Pty(#[from] PtyError),
}

#[derive(Debug, Deserialize)]
struct ResizePayload {
    cols: u16,
    rows: u16,
}

#[derive(Debug, Deserialize)]
struct KillPayload {
    signal: Option<String>,
}

/// Route one control request to exactly one PTY operation.
///
/// `/write` streams the body and writes each chunk as it arrives, so a
/// caller cancelling mid-stream leaves whatever was already written in
/// place. Unrecognized paths deliberately succeed: controllers can probe
/// the endpoint, and new commands can be added without breaking old
/// servers.
pub(crate) async fn dispatch(pty: &PtyHandle, req: Request) -> Result<(), DispatchError> {
    let (parts, body) = req.into_parts();
    match parts.uri.path() {
        "/resize" => {
            let payload: ResizePayload = parse_body(&parts.method, body).await?;
            pty.resize(payload.cols, payload.rows)?;
        }
        "/clear" => pty.clear()?,
        "/write" => {
            let mut body = body;
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(DispatchError::Body)?;
                if let Ok(chunk) = frame.into_data() {
                    pty.write(&chunk)?;
                }
            }
        }
        "/kill" => {
            let payload: KillPayload = parse_body(&parts.method, body).await?;
            pty.kill(payload.signal.as_deref())?;
        }
        "/pause" => pty.pause()?,
        "/resume" => pty.resume()?,
        _ => {}
    }
    Ok(())
}

/// Structured payloads are only read from methods that carry a body.
async fn parse_body<T>(method: &Method, body: Body) -> Result<T, DispatchError>
where
    T: serde::de::DeserializeOwned,
{
    if method != Method::POST {
        return Err(DispatchError::BodylessMethod(method.clone()));
    }
    let bytes = body.collect().await.map_err(DispatchError::Body)?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}
