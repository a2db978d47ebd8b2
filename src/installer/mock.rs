use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{InstallOutcome, PackageManager};

/// A scripted package manager for tests.
///
/// Installs succeed unless the request names an unresolvable package, in
/// which case the whole invocation fails, the way a real batch would.
#[derive(Default)]
pub struct MockPackageManager {
    importable: Mutex<HashSet<String>>,
    unresolvable: HashSet<String>,
    install_delay: Option<Duration>,
    probes: AtomicUsize,
    installs: Mutex<Vec<Vec<String>>>,
}

impl MockPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules that probe as importable without installing.
    pub fn with_importable<I, S>(self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock_importable().extend(modules.into_iter().map(Into::into));
        self
    }

    /// Package names whose install always fails.
    pub fn with_unresolvable<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unresolvable.extend(packages.into_iter().map(Into::into));
        self
    }

    /// Make every install call take this long.
    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = Some(delay);
        self
    }

    /// Every install invocation so far, in order.
    pub fn install_calls(&self) -> Vec<Vec<String>> {
        self.installs
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn lock_importable(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.importable
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl PackageManager for MockPackageManager {
    async fn probe(&self, module: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.lock_importable().contains(module)
    }

    async fn install(&self, packages: &[String]) -> InstallOutcome {
        if let Ok(mut calls) = self.installs.lock() {
            calls.push(packages.to_vec());
        }
        if let Some(delay) = self.install_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(bad) = packages.iter().find(|p| self.unresolvable.contains(*p)) {
            return InstallOutcome::Failed {
                code: Some(1),
                detail: format!("No matching distribution found for {bad}"),
            };
        }

        self.lock_importable().extend(packages.iter().cloned());
        InstallOutcome::Installed
    }
}
