use clap::Parser;
use tracing_subscriber::EnvFilter;

use pty_serve::cli::Cli;
use pty_serve::lifecycle;

/// Diagnostics go to stderr; stdout belongs to the PTY's output relay.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Cli::parse().into_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let exit_code = runtime.block_on(lifecycle::run(config))?;
    runtime.shutdown_background();

    std::process::exit(exit_code);
}
