//! Makes sure imported modules are available before a file runs.
//!
//! The policy is best effort throughout: one batched install for everything
//! missing, then one install per module if the batch fails. A module that
//! cannot be installed is skipped; the program's own import error reports it.

pub mod mock;
pub mod pip;

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::PackageCache;
use crate::consts::{BATCH_INSTALL_TIMEOUT, PACKAGE_INSTALL_TIMEOUT, PROBE_CONCURRENCY};

/// Import names whose distribution is published under a different name.
const KNOWN_DISTRIBUTIONS: &[(&str, &str)] = &[
    ("Crypto", "pycryptodome"),
    ("OpenSSL", "pyOpenSSL"),
    ("PIL", "Pillow"),
    ("attr", "attrs"),
    ("bs4", "beautifulsoup4"),
    ("cv2", "opencv-python"),
    ("dateutil", "python-dateutil"),
    ("docx", "python-docx"),
    ("dotenv", "python-dotenv"),
    ("jwt", "PyJWT"),
    ("magic", "python-magic"),
    ("pptx", "python-pptx"),
    ("serial", "pyserial"),
    ("sklearn", "scikit-learn"),
    ("telegram", "python-telegram-bot"),
    ("usb", "pyusb"),
    ("yaml", "PyYAML"),
];

/// What happened to one package-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The package manager ran and exited unsuccessfully.
    Failed { code: Option<i32>, detail: String },
    TimedOut,
    /// The package manager could not be started at all.
    Unavailable(String),
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed)
    }
}

/// Something that can check for and install Python packages.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Whether `module` imports successfully right now.
    async fn probe(&self, module: &str) -> bool;

    /// Install all of `packages` in one invocation.
    async fn install(&self, packages: &[String]) -> InstallOutcome;
}

#[derive(Debug, Clone)]
pub struct InstallerConfig {
    pub batch_timeout: Duration,
    pub package_timeout: Duration,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            batch_timeout: BATCH_INSTALL_TIMEOUT,
            package_timeout: PACKAGE_INSTALL_TIMEOUT,
        }
    }
}

/// Resolves missing modules against the shared cache and a package manager.
pub struct Installer {
    manager: Arc<dyn PackageManager>,
    cache: Arc<PackageCache>,
    config: InstallerConfig,
}

impl Installer {
    pub fn new(
        manager: Arc<dyn PackageManager>,
        cache: Arc<PackageCache>,
        config: InstallerConfig,
    ) -> Self {
        Self {
            manager,
            cache,
            config,
        }
    }

    /// Install whatever in `modules` is neither cached nor importable.
    ///
    /// Returns the modules installed by this call, in sorted order.
    pub async fn ensure_installed(&self, modules: &BTreeSet<String>) -> Vec<String> {
        let pending = self.probe_uncached(modules).await.missing;
        if pending.is_empty() {
            return Vec::new();
        }

        let batch: Vec<String> = pending.iter().map(|m| distribution_name(m)).collect();
        info!(packages = ?batch, "installing");

        let outcome = self.attempt(&batch, self.config.batch_timeout).await;
        if outcome.is_installed() {
            self.cache.mark_installed(pending.iter().cloned());
            return pending;
        }
        warn!(?outcome, "batch install failed, falling back to one package at a time");

        let mut installed = Vec::new();
        for module in pending {
            if self.install_one(&module).await {
                self.cache.mark_installed([module.clone()]);
                installed.push(module);
            }
        }
        installed
    }

    /// Probe `modules` and cache the importable ones. Nothing is installed.
    ///
    /// Returns how many were found importable.
    pub async fn warm_up(&self, modules: &[&str]) -> usize {
        let modules: BTreeSet<String> = modules.iter().map(|m| m.to_string()).collect();
        let probed = self.probe_uncached(&modules).await;
        debug!(missing = ?probed.missing, "warm-up finished");
        probed.importable
    }

    /// Filter out cached modules, probe the rest, and cache what imports.
    ///
    /// At most [`PROBE_CONCURRENCY`] probes run at once.
    async fn probe_uncached(&self, modules: &BTreeSet<String>) -> Probed {
        let candidates: Vec<String> = modules
            .iter()
            .filter(|m| !self.cache.contains(m))
            .filter(|m| {
                let ok = is_identifier(m);
                if !ok {
                    debug!(module = %m, "skipping name that cannot be imported");
                }
                ok
            })
            .cloned()
            .collect();
        let mut probed = Probed::default();
        if candidates.is_empty() {
            return probed;
        }

        let manager = &self.manager;
        let results: Vec<bool> = futures::stream::iter(candidates.clone())
            .map(|module| async move { manager.probe(&module).await })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await;

        for (module, importable) in candidates.into_iter().zip(results) {
            if importable {
                self.cache.mark_installed([module]);
                probed.importable += 1;
            } else {
                probed.missing.push(module);
            }
        }
        probed
    }

    /// Try each spelling of `module` until one installs.
    async fn install_one(&self, module: &str) -> bool {
        for package in name_variants(module) {
            let outcome = self
                .attempt(std::slice::from_ref(&package), self.config.package_timeout)
                .await;
            if outcome.is_installed() {
                info!(%module, %package, "installed");
                return true;
            }
            debug!(%module, %package, ?outcome, "install attempt failed");
        }
        warn!(%module, "could not install");
        false
    }

    async fn attempt(&self, packages: &[String], limit: Duration) -> InstallOutcome {
        match tokio::time::timeout(limit, self.manager.install(packages)).await {
            Ok(outcome) => outcome,
            Err(_) => InstallOutcome::TimedOut,
        }
    }
}

/// Result of probing the uncached part of a module set.
#[derive(Debug, Default)]
struct Probed {
    importable: usize,
    missing: Vec<String>,
}

/// Package names to try for `module`, most likely first.
///
/// Order: known distribution alias, the name itself, hyphenated.
pub fn name_variants(module: &str) -> Vec<String> {
    let alias = KNOWN_DISTRIBUTIONS
        .iter()
        .find(|(import, _)| *import == module)
        .map(|(_, dist)| dist.to_string());

    let mut variants: Vec<String> = Vec::new();
    let candidates = alias
        .into_iter()
        .chain([module.to_string(), module.replace('_', "-")]);
    for candidate in candidates {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// The package name used for `module` in a batch install.
pub fn distribution_name(module: &str) -> String {
    name_variants(module)
        .into_iter()
        .next()
        .unwrap_or_else(|| module.to_string())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_without_alias_or_separators() {
        assert_eq!(name_variants("requests"), vec!["requests"]);
    }

    #[test]
    fn variants_hyphenate_underscores() {
        assert_eq!(
            name_variants("google_auth"),
            vec!["google_auth", "google-auth"]
        );
    }

    #[test]
    fn variants_put_known_alias_first() {
        assert_eq!(name_variants("yaml"), vec!["PyYAML", "yaml"]);
        assert_eq!(name_variants("cv2"), vec!["opencv-python", "cv2"]);
    }

    #[test]
    fn distribution_name_uses_alias() {
        assert_eq!(distribution_name("PIL"), "Pillow");
        assert_eq!(distribution_name("numpy"), "numpy");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("numpy"));
        assert!(is_identifier("Crypto"));
        assert!(is_identifier("py3"));
        assert!(!is_identifier("-r"));
        assert!(!is_identifier("3d"));
        assert!(!is_identifier("foo;bar"));
        assert!(!is_identifier("("));
        assert!(!is_identifier(""));
    }

    #[test]
    fn known_distributions_are_sorted() {
        for pair in KNOWN_DISTRIBUTIONS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn outcome_is_installed() {
        assert!(InstallOutcome::Installed.is_installed());
        assert!(!InstallOutcome::TimedOut.is_installed());
        assert!(
            !InstallOutcome::Failed {
                code: Some(1),
                detail: String::new()
            }
            .is_installed()
        );
    }
}
