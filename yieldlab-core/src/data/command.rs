//! Collector that runs an external program and reads a raw table from its stdout.
//!
//! This is how browser-driven scrapers plug in: the program receives the
//! window through `{start}` / `{end}` placeholders in its arguments (and the
//! `YIELDLAB_START` / `YIELDLAB_END` environment variables) and prints CSV.

use super::codec::{read_raw_rows, RawTableOptions};
use super::collector::{Collector, DataError};
use crate::domain::{FetchWindow, ObservationRow};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

/// Bytes of stderr kept in a failure message.
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct CommandCollector {
    name: String,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    options: RawTableOptions,
}

impl CommandCollector {
    pub fn new(name: impl Into<String>, program: impl Into<String>, options: RawTableOptions) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            options,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Arguments with window placeholders substituted.
    fn render_args(&self, window: &FetchWindow) -> Vec<String> {
        let start = window.start().format("%Y-%m-%d").to_string();
        let end = window.end().format("%Y-%m-%d").to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{start}", &start).replace("{end}", &end))
            .collect()
    }
}

impl Collector for CommandCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self, window: &FetchWindow) -> Result<Vec<ObservationRow>, DataError> {
        let args = self.render_args(window);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .envs(&self.env)
            .env("YIELDLAB_START", window.start().format("%Y-%m-%d").to_string())
            .env("YIELDLAB_END", window.end().format("%Y-%m-%d").to_string());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(collector = %self.name, program = %self.program, ?args, "spawning collector");
        let output = cmd
            .output()
            .map_err(|e| DataError::fetch(&self.name, format!("cannot run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DataError::fetch(
                &self.name,
                format!("{} exited with {}: {}", self.program, output.status, tail(stderr.trim())),
            ));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            tracing::info!(collector = %self.name, %window, "collector produced no output");
            return Ok(Vec::new());
        }

        let rows = read_raw_rows(output.stdout.as_slice(), &self.options, &self.name)?;
        Ok(rows.into_iter().filter(|row| window.contains(row.date)).collect())
    }
}

/// Last `STDERR_TAIL` bytes, cut on a char boundary.
fn tail(s: &str) -> &str {
    if s.len() <= STDERR_TAIL {
        return s;
    }
    let mut start = s.len() - STDERR_TAIL;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
