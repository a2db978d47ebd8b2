//! Runs a source file in a fresh interpreter process and captures its output.
//!
//! There is no run-time limit unless one is configured explicitly: the
//! runner waits for the child for as long as it takes and never kills it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::{DEFAULT_PYTHON, STDERR_LIMIT, STDOUT_LIMIT};
use crate::error::{EngineError, Result};

pub const ERROR_HEADING: &str = "Error:";
pub const WARNING_HEADING: &str = "Warning:";
pub const NO_OUTPUT: &str = "No output";

/// Terminal status of a run, judged from its stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Failure,
}

/// Decide whether captured stderr describes a failure.
///
/// Any mention of `Error` or `Exception` counts, whatever the exit code.
pub fn classify(stderr: &str) -> RunStatus {
    if stderr.contains("Error") || stderr.contains("Exception") {
        RunStatus::Failure
    } else {
        RunStatus::Success
    }
}

/// Longest prefix of `text` that fits in `max_bytes` and ends on a char boundary.
pub fn truncate(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Longest suffix of `text` that fits in `max_bytes` and starts on a char boundary.
pub fn truncate_tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Byte budgets applied when rendering a result.
#[derive(Debug, Clone, Copy)]
pub struct OutputLimits {
    pub stdout: usize,
    pub stderr: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            stdout: STDOUT_LIMIT,
            stderr: STDERR_LIMIT,
        }
    }
}

/// Everything captured from one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub status: RunStatus,
    /// Packages installed for this request before the run.
    pub installed: Vec<String>,
}

impl ExecutionResult {
    pub fn new(stdout: &[u8], stderr: &[u8], exit_code: Option<i32>) -> Self {
        let stdout = String::from_utf8_lossy(stdout).into_owned();
        let stderr = String::from_utf8_lossy(stderr).into_owned();
        let status = classify(&stderr);
        Self {
            stdout,
            stderr,
            exit_code,
            status,
            installed: Vec::new(),
        }
    }

    pub fn with_installed(mut self, installed: Vec<String>) -> Self {
        self.installed = installed;
        self
    }

    /// Bounded, user-facing rendering of the captured streams.
    ///
    /// A failure replaces stdout with the error block, keeping the end of
    /// stderr; otherwise non-empty stderr is appended as a warning.
    pub fn render(&self, limits: &OutputLimits) -> String {
        if self.status == RunStatus::Failure {
            // Tracebacks end with the exception line.
            let stderr = truncate_tail(&self.stderr, limits.stderr);
            return format!("{ERROR_HEADING}\n{stderr}");
        }

        let stderr = truncate(&self.stderr, limits.stderr);

        let stdout = truncate(&self.stdout, limits.stdout);
        let mut out = if stdout.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            stdout.to_string()
        };
        if !stderr.is_empty() {
            out.push_str(&format!("\n\n{WARNING_HEADING}\n{stderr}"));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub interpreter: PathBuf,
    /// `None` waits forever. Leave it that way unless you mean it.
    pub timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_PYTHON),
            timeout: None,
        }
    }
}

/// Launches files as child processes of the configured interpreter.
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run `path` with its parent directory as the working directory.
    ///
    /// The file is left where it is; removing it is the caller's job.
    pub async fn run(&self, path: &Path) -> Result<ExecutionResult> {
        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| EngineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let work_dir = path.parent().unwrap_or(Path::new("/"));

        let child = Command::new(&self.config.interpreter)
            .arg(&path)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.config.timeout.is_some())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                interpreter: self.config.interpreter.clone(),
                source,
            })?;
        info!(file = %path.display(), pid = ?child.id(), "started");

        let output = match self.config.timeout {
            None => child.wait_with_output().await,
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| EngineError::TimedOut(limit))?,
        }
        .map_err(EngineError::Wait)?;

        let result = ExecutionResult::new(&output.stdout, &output.stderr, output.status.code());
        debug!(
            exit_code = ?result.exit_code,
            status = ?result.status,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "finished"
        );
        Ok(result)
    }
}
