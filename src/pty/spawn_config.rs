use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use portable_pty::{CommandBuilder, PtySize};
use serde::Deserialize;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
const DEFAULT_TERM: &str = "xterm-256color";

/// Spawn-time options supplied by the controller as a JSON document via
/// `--options`. Field names follow the conventional PTY fork options:
/// `name` is the TERM value, `cols`/`rows` the initial window size, plus an
/// optional working directory and extra environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnOptions {
    pub name: Option<String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
}

impl SpawnOptions {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn size(&self) -> PtySize {
        PtySize {
            rows: self.rows.unwrap_or(DEFAULT_ROWS),
            cols: self.cols.unwrap_or(DEFAULT_COLS),
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    pub fn command_builder(&self, command: &str, args: &[String]) -> io::Result<CommandBuilder> {
        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);
        match &self.cwd {
            Some(cwd) => cmd.cwd(cwd),
            None => cmd.cwd(std::env::current_dir()?),
        }
        cmd.env("TERM", self.name.as_deref().unwrap_or(DEFAULT_TERM));
        if let Some(env) = &self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::{SpawnOptions, DEFAULT_COLS, DEFAULT_ROWS};

    #[test]
    fn defaults_to_80_by_24() {
        let options = SpawnOptions::default();
        let size = options.size();
        assert_eq!(size.cols, DEFAULT_COLS);
        assert_eq!(size.rows, DEFAULT_ROWS);
    }

    #[test]
    fn parses_camel_case_fields() {
        let options = SpawnOptions::parse(
            r#"{"name":"xterm","cols":120,"rows":40,"cwd":"/tmp","env":{"FOO":"bar"}}"#,
        )
        .expect("parse");
        assert_eq!(options.name.as_deref(), Some("xterm"));
        assert_eq!(options.cols, Some(120));
        assert_eq!(options.rows, Some(40));
        assert_eq!(options.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
        assert_eq!(
            options.env.as_ref().and_then(|env| env.get("FOO")).map(String::as_str),
            Some("bar")
        );
    }

    #[test]
    fn ignores_unknown_fields() {
        let options = SpawnOptions::parse(r#"{"cols":100,"handleFlowControl":true}"#).expect("parse");
        assert_eq!(options.cols, Some(100));
    }

    #[test]
    fn rejects_non_json() {
        assert!(SpawnOptions::parse("not-json").is_err());
    }
}
