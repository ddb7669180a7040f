//! Serve a PTY-hosted process over a local HTTP control endpoint.
//!
//! The binary spawns one child on a pseudo-terminal, relays its output to
//! stdout, and accepts control requests (`/resize`, `/write`, `/clear`,
//! `/kill`, `/pause`, `/resume`) over a Unix socket or TCP port. When the
//! child exits, the server drains and the process exits with the child's
//! exit code.

pub mod cli;
pub mod lifecycle;
pub mod pty;
pub mod server;
