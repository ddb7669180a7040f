use std::sync::Arc;
use std::time::Duration;

use pty_serve::lifecycle::{DrainTrigger, Lifecycle, Phase};
use pty_serve::pty::{ExitInfo, Signal};

#[test]
fn phases_advance_in_order() {
    let lifecycle = Lifecycle::new();
    assert_eq!(lifecycle.phase(), Phase::Starting);

    lifecycle.mark_listening();
    assert_eq!(lifecycle.phase(), Phase::Listening);

    assert!(lifecycle.begin_drain(DrainTrigger::ChildExit(ExitInfo { code: 3 })));
    assert_eq!(lifecycle.phase(), Phase::Draining);

    lifecycle.mark_closed();
    assert_eq!(lifecycle.phase(), Phase::Closed);
}

#[test]
fn first_drain_trigger_wins() {
    let lifecycle = Lifecycle::new();
    lifecycle.mark_listening();

    assert!(lifecycle.begin_drain(DrainTrigger::Signal(Signal::Term)));
    assert!(!lifecycle.begin_drain(DrainTrigger::ChildExit(ExitInfo { code: 0 })));

    assert_eq!(lifecycle.trigger(), Some(DrainTrigger::Signal(Signal::Term)));
}

#[tokio::test]
async fn concurrent_triggers_drain_exactly_once() {
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.mark_listening();

    let mut tasks = Vec::new();
    for code in 0..8 {
        let lifecycle = Arc::clone(&lifecycle);
        tasks.push(tokio::spawn(async move {
            lifecycle.begin_drain(DrainTrigger::ChildExit(ExitInfo { code }))
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.expect("trigger task") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(lifecycle.phase(), Phase::Draining);
}

#[tokio::test]
async fn drained_wakes_waiters() {
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.mark_listening();

    let waiter = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.drained().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    lifecycle.begin_drain(DrainTrigger::ChildExit(ExitInfo { code: 0 }));

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter wakes after drain")
        .expect("waiter task");
}

#[tokio::test]
async fn drained_returns_immediately_when_already_draining() {
    let lifecycle = Lifecycle::new();
    lifecycle.begin_drain(DrainTrigger::Signal(Signal::Int));

    tokio::time::timeout(Duration::from_millis(100), lifecycle.drained())
        .await
        .expect("already drained");
}

/// Whole-host tests: `run()` driven over a real unix socket, with requests
/// sent as raw HTTP/1.1 on a `UnixStream`.
#[cfg(unix)]
mod run_host {
    use std::path::Path;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    use pty_serve::cli::ServerConfig;
    use pty_serve::lifecycle;
    use pty_serve::pty::SpawnOptions;
    use pty_serve::server::Endpoint;

    fn unix_config(path: &Path, command: &str, args: &[&str]) -> ServerConfig {
        ServerConfig {
            endpoint: Endpoint::Unix(path.to_path_buf()),
            options: SpawnOptions::default(),
            command: command.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    async fn connect(path: &Path) -> UnixStream {
        for _ in 0..200 {
            if let Ok(stream) = UnixStream::connect(path).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("control socket never came up at {}", path.display());
    }

    #[tokio::test]
    async fn run_returns_the_child_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("host.sock");
        let config = unix_config(&path, "sh", &["-c", "exit 7"]);

        let code = tokio::time::timeout(Duration::from_secs(10), lifecycle::run(config))
            .await
            .expect("run returns within bounded wait")
            .expect("run succeeds");

        assert_eq!(code, 7);
        assert!(!path.exists(), "socket file must be removed on shutdown");
    }

    #[tokio::test]
    async fn kill_over_the_socket_shuts_the_host_down() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("host.sock");
        let config = unix_config(&path, "cat", &[]);

        let host = tokio::spawn(lifecycle::run(config));
        let mut stream = connect(&path).await;

        let body = r#"{"signal":"SIGTERM"}"#;
        let request = format!(
            "POST /kill HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len(),
        );
        stream
            .write_all(request.as_bytes())
            .await
            .expect("send kill request");

        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response).await;
        let response = String::from_utf8_lossy(&response);
        assert!(
            response.starts_with("HTTP/1.1 200"),
            "kill should be accepted, got: {response:?}"
        );

        tokio::time::timeout(Duration::from_secs(10), host)
            .await
            .expect("host shuts down within bounded wait")
            .expect("host task")
            .expect("run succeeds");
        assert!(!path.exists(), "socket file must be removed on shutdown");
    }
}
