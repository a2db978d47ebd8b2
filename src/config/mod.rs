//! Resolved runtime settings.
//!
//! `main.rs` fills a [`Settings`] from flags and environment variables;
//! everything else asks it for the per-component config it needs.

use anyhow::{Result, bail};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::PackageCache;
use crate::consts::{
    BATCH_INSTALL_TIMEOUT, CHUNK_LIMIT, DEFAULT_HEALTH_PORT, DEFAULT_PYTHON, MESSAGE_LIMIT,
    PACKAGE_INSTALL_TIMEOUT, STDERR_LIMIT, STDOUT_LIMIT, default_scratch_dir,
};
use crate::delivery::DeliveryConfig;
use crate::engine::pipeline::ExecutionEngine;
use crate::format::Formatter;
use crate::installer::{Installer, InstallerConfig, PackageManager};
use crate::runner::{OutputLimits, Runner, RunnerConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub python: PathBuf,
    pub stdout_limit: usize,
    pub stderr_limit: usize,
    pub message_limit: usize,
    pub chunk_limit: usize,
    pub batch_timeout: Duration,
    pub package_timeout: Duration,
    /// Off unless explicitly requested.
    pub run_timeout: Option<Duration>,
    pub scratch_dir: PathBuf,
    pub health_port: u16,
    pub warm_up: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            python: PathBuf::from(DEFAULT_PYTHON),
            stdout_limit: STDOUT_LIMIT,
            stderr_limit: STDERR_LIMIT,
            message_limit: MESSAGE_LIMIT,
            chunk_limit: CHUNK_LIMIT,
            batch_timeout: BATCH_INSTALL_TIMEOUT,
            package_timeout: PACKAGE_INSTALL_TIMEOUT,
            run_timeout: None,
            scratch_dir: default_scratch_dir(),
            health_port: DEFAULT_HEALTH_PORT,
            warm_up: true,
        }
    }
}

impl Settings {
    /// Reject values that would make every reply empty or every install time out.
    pub fn validate(&self) -> Result<()> {
        if self.message_limit == 0 {
            bail!("message limit must be greater than zero");
        }
        if self.chunk_limit == 0 {
            bail!("chunk limit must be greater than zero");
        }
        if self.batch_timeout.is_zero() || self.package_timeout.is_zero() {
            bail!("install timeouts must be greater than zero");
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            bail!("run timeout must be greater than zero when set");
        }
        Ok(())
    }

    pub fn installer_config(&self) -> InstallerConfig {
        InstallerConfig {
            batch_timeout: self.batch_timeout,
            package_timeout: self.package_timeout,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            interpreter: self.python.clone(),
            timeout: self.run_timeout,
        }
    }

    pub fn formatter(&self) -> Formatter {
        Formatter::new(
            OutputLimits {
                stdout: self.stdout_limit,
                stderr: self.stderr_limit,
            },
            self.message_limit,
        )
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            scratch_dir: self.scratch_dir.clone(),
            chunk_limit: self.chunk_limit,
        }
    }

    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.health_port))
    }

    /// Wire an engine from these settings around `manager` and a shared cache.
    pub fn build_engine(
        &self,
        manager: Arc<dyn PackageManager>,
        cache: Arc<PackageCache>,
    ) -> ExecutionEngine {
        ExecutionEngine::new(
            Installer::new(manager, cache, self.installer_config()),
            Runner::new(self.runner_config()),
            self.formatter(),
        )
    }
}
