//! Target process configuration.
//!
//! A [`Spawnable`] collects everything needed to launch the profiled
//! command: working directory, argument vector, and environment overrides
//! layered on top of the inherited environment.

use std::io;
use std::path::{Path, PathBuf};
use tokio::process::{Child, Command};

/// Configuration for the process a recording session spawns.
#[derive(Debug, Clone)]
pub struct Spawnable {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Spawnable {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), cwd: None, env: Vec::new() }
    }

    /// Append arguments passed to the target.
    pub fn append_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Working directory for the target. Defaults to the inherited one.
    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) {
        self.cwd = Some(cwd.into());
    }

    /// Override one environment variable for the target.
    pub fn setenv(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.push((key.into(), value.into()));
    }

    /// The command name used for `process_started` notifications.
    pub fn command_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }

    /// Launch the target process.
    ///
    /// # Errors
    /// Propagates the spawn failure (command not found, permission denied).
    pub fn spawn(&self) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command.spawn()
    }
}

/// Parse one `--env` overlay entry.
///
/// `NAME=VALUE` splits at the first `=`; a bare `NAME` maps to an empty
/// value.
pub fn parse_overlay_entry(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (entry.to_string(), String::new()),
    }
}
