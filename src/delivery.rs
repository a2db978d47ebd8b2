//! The caller side of the engine: scratch files, replies, message splitting.
//!
//! Every submission gets its own temporary directory so two users sending
//! `main.py` at the same time never collide. The directory is removed when
//! the submission finishes, whichever way it finishes.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::consts::{CHUNK_LIMIT, default_scratch_dir};
use crate::engine::{Engine, Report};
use crate::events::{Event, EventBus};

/// Prefix for replies that carry program output.
pub const OUTPUT_PREFIX: &str = "Output:\n";

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub scratch_dir: PathBuf,
    /// Largest message the transport accepts.
    pub chunk_limit: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            chunk_limit: CHUNK_LIMIT,
        }
    }
}

/// A report ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub chunks: Vec<String>,
    pub ok: bool,
}

impl Reply {
    pub fn from_report(report: Report, chunk_limit: usize) -> Self {
        let text = if report.ok {
            format!("{OUTPUT_PREFIX}{}", report.text)
        } else {
            report.text
        };
        Self {
            chunks: split_message(&text, chunk_limit),
            ok: report.ok,
        }
    }
}

/// Accepts uploaded files and runs them through an [`Engine`].
pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    config: DeliveryConfig,
    events: Option<Arc<EventBus>>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn Engine>, config: DeliveryConfig) -> Self {
        Self {
            engine,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Materialize `contents` as `file_name` in fresh scratch space, run it,
    /// and clean up.
    ///
    /// Errors only for rejected or unwritable submissions; anything that goes
    /// wrong while running is part of the reply.
    pub async fn submit(&self, file_name: &str, contents: &[u8]) -> Result<Reply> {
        let name = Path::new(file_name)
            .file_name()
            .with_context(|| format!("invalid file name: {file_name:?}"))?;
        if !file_name.ends_with(".py") {
            bail!("only .py files are accepted (got {file_name:?})");
        }

        tokio::fs::create_dir_all(&self.config.scratch_dir)
            .await
            .with_context(|| format!("cannot create {}", self.config.scratch_dir.display()))?;
        // Dropping the TempDir removes it, so every exit path below cleans up.
        let workspace = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&self.config.scratch_dir)
            .context("cannot create scratch directory")?;
        let path = workspace.path().join(name);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;

        self.emit(Event::Received {
            request: name.to_string_lossy().into_owned(),
        });
        debug!(path = %path.display(), bytes = contents.len(), "submission written");

        let report = self.engine.run(&path).await;

        let dir = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!(dir = %dir.display(), error = %e, "scratch cleanup failed");
        }

        Ok(Reply::from_report(report, self.config.chunk_limit))
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Split `text` into pieces of at most `limit` bytes, preferring line breaks.
///
/// Concatenating the pieces gives back `text`. A `limit` of zero is treated
/// as one byte per piece (rounded up to whole characters).
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= limit {
            chunks.push(rest.to_string());
            break;
        }

        let mut end = limit;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single character wider than the limit still has to go somewhere.
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        } else if let Some(newline) = rest[..end].rfind('\n') {
            end = newline + 1;
        }

        let (head, tail) = rest.split_at(end);
        chunks.push(head.to_string());
        rest = tail;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn empty_text_is_one_empty_chunk() {
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn splits_on_line_breaks_when_possible() {
        let chunks = split_message("aaa\nbbb\nccc\n", 9);
        assert_eq!(chunks, vec!["aaa\nbbb\n", "ccc\n"]);
    }

    #[test]
    fn hard_splits_long_lines() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn chunks_fit_and_reassemble() {
        let text = "line with ünïcödé\n".repeat(400);
        for limit in [1, 7, 64, 4096] {
            let chunks = split_message(&text, limit);
            assert!(chunks.iter().all(|c| c.len() <= limit.max(2)), "limit {limit}");
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn ok_reply_is_prefixed() {
        let reply = Reply::from_report(
            Report {
                text: "hi".to_string(),
                ok: true,
            },
            100,
        );
        assert_eq!(reply.chunks, vec!["Output:\nhi"]);
        assert!(reply.ok);
    }

    #[test]
    fn failed_reply_is_not_prefixed() {
        let reply = Reply::from_report(
            Report {
                text: "Error: cannot start python3".to_string(),
                ok: false,
            },
            100,
        );
        assert_eq!(reply.chunks, vec!["Error: cannot start python3"]);
        assert!(!reply.ok);
    }
}
