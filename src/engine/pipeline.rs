use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use super::{Engine, Report};
use crate::error::{EngineError, Result};
use crate::events::{Event, EventBus};
use crate::format::Formatter;
use crate::imports;
use crate::installer::Installer;
use crate::runner::{ExecutionResult, Runner};

/// Extract imports, install what is missing, run, format.
pub struct ExecutionEngine {
    installer: Installer,
    runner: Runner,
    formatter: Formatter,
    events: Option<Arc<EventBus>>,
}

impl ExecutionEngine {
    pub fn new(installer: Installer, runner: Runner, formatter: Formatter) -> Self {
        Self {
            installer,
            runner,
            formatter,
            events: None,
        }
    }

    /// Emit progress on `events` while running.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// The pipeline with engine-level failures still as errors.
    pub async fn execute(&self, path: &Path) -> Result<ExecutionResult> {
        let request = request_label(path);

        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EngineError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let modules = imports::extract(&source);
        self.emit(Event::Resolving {
            request: request.clone(),
            modules: modules.iter().cloned().collect(),
        });
        let installed = self.installer.ensure_installed(&modules).await;

        self.emit(Event::Running { request });
        let result = self.runner.run(path).await?;
        Ok(result.with_installed(installed))
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

#[async_trait]
impl Engine for ExecutionEngine {
    async fn run(&self, path: &Path) -> Report {
        let report = match self.execute(path).await {
            Ok(result) => {
                info!(
                    file = %path.display(),
                    status = ?result.status,
                    installed = result.installed.len(),
                    "run complete"
                );
                Report {
                    text: self.formatter.format(&result.installed, &result),
                    ok: true,
                }
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "engine failure");
                Report {
                    text: format!("Error: {e}"),
                    ok: false,
                }
            }
        };

        self.emit(Event::Finished {
            request: request_label(path),
            ok: report.ok,
        });
        report
    }
}

fn request_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
