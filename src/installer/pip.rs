use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{InstallOutcome, PackageManager};

/// Keep this much of pip's stderr when an install fails.
const MAX_DETAIL_BYTES: usize = 2_000;

/// `pip` driven through a Python interpreter (`<python> -m pip install ...`).
#[derive(Debug, Clone)]
pub struct Pip {
    python: PathBuf,
}

impl Pip {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

#[async_trait]
impl PackageManager for Pip {
    async fn probe(&self, module: &str) -> bool {
        Command::new(&self.python)
            .arg("-c")
            .arg(format!("import {module}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn install(&self, packages: &[String]) -> InstallOutcome {
        // kill_on_drop: a caller-side timeout drops this future and must not leave pip behind.
        let output = Command::new(&self.python)
            .args(["-m", "pip", "install", "--quiet", "--disable-pip-version-check"])
            .args(packages)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => InstallOutcome::Installed,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                InstallOutcome::Failed {
                    code: output.status.code(),
                    detail: crate::runner::truncate(stderr.trim(), MAX_DETAIL_BYTES).to_string(),
                }
            }
            Err(e) => InstallOutcome::Unavailable(e.to_string()),
        }
    }
}
