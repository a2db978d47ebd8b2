pub mod pipeline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the engine hands back for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub text: String,
    /// False only when the engine itself failed (unreadable file, no interpreter).
    /// A crashing user program still yields `ok: true`.
    pub ok: bool,
}

/// The outermost boundary. Delivery channels only know this trait.
///
/// `run` never fails: every problem below it becomes report text.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&self, path: &Path) -> Report;
}
