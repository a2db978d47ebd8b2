use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the engine itself, as opposed to failures of the user's code.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start {}: {source}", .interpreter.display())]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lost track of child process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("run exceeded {}s", .0.as_secs())]
    TimedOut(Duration),
}

pub type Result<T> = std::result::Result<T, EngineError>;
