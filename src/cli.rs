use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::pty::SpawnOptions;
use crate::server::Endpoint;

const DEFAULT_HOSTNAME: &str = "127.0.0.1";

/// Host a command on a pseudo-terminal and control it over a local HTTP
/// endpoint (resize, write, clear, pause, resume, kill).
#[derive(Debug, Parser)]
#[command(name = "pty-serve", version, about)]
pub struct Cli {
    /// JSON spawn options forwarded to the PTY (name, cols, rows, cwd, env)
    #[arg(short = 'o', long, value_name = "JSON")]
    pub options: Option<String>,

    /// Unix socket path to listen on
    #[arg(short = 's', long, value_name = "PATH", conflicts_with_all = ["hostname", "port"])]
    pub socket: Option<PathBuf>,

    /// Hostname for the TCP listener
    #[arg(short = 'H', long, value_name = "HOST", requires = "port")]
    pub hostname: Option<String>,

    /// TCP port to listen on
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Command to run on the PTY, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 1..
    )]
    pub command: Vec<String>,
}

/// Validated runtime configuration: exactly one endpoint, parsed spawn
/// options, and the command line to host.
#[derive(Debug)]
pub struct ServerConfig {
    pub endpoint: Endpoint,
    pub options: SpawnOptions,
    pub command: String,
    pub args: Vec<String>,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<ServerConfig> {
        let endpoint = match (self.socket, self.port) {
            (Some(path), None) => Endpoint::Unix(path),
            (None, Some(port)) => Endpoint::Tcp {
                host: self
                    .hostname
                    .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
                port,
            },
            (Some(_), Some(_)) => anyhow::bail!("--socket and --port are mutually exclusive"),
            (None, None) => anyhow::bail!("either --socket or --port is required"),
        };

        let options = match self.options.as_deref() {
            Some(json) => SpawnOptions::parse(json).context("invalid --options JSON")?,
            None => SpawnOptions::default(),
        };
        if options.cols == Some(0) || options.rows == Some(0) {
            anyhow::bail!("cols and rows in --options must be positive");
        }

        let mut parts = self.command.into_iter();
        let command = parts.next().context("missing command to run")?;
        Ok(ServerConfig {
            endpoint,
            options,
            command,
            args: parts.collect(),
        })
    }
}
