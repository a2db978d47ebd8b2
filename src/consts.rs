//! Project-wide constants.

use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");

/// Interpreter used for probing, installing and running when none is given.
pub const DEFAULT_PYTHON: &str = "python3";

/// Bytes of captured stdout kept in a result.
pub const STDOUT_LIMIT: usize = 3500;

/// Bytes of captured stderr kept in a result.
pub const STDERR_LIMIT: usize = 1000;

/// Cap on the whole formatted message.
pub const MESSAGE_LIMIT: usize = 4000;

/// Largest single message the delivery side sends.
pub const CHUNK_LIMIT: usize = 4096;

/// How many installed packages the result header lists by name.
pub const INSTALLED_PREVIEW: usize = 5;

/// Bound on the single batched install call.
pub const BATCH_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Bound on each per-package fallback install call.
pub const PACKAGE_INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Most import probes (each a child interpreter) in flight at once.
pub const PROBE_CONCURRENCY: usize = 8;

/// Port for the liveness endpoint when `PORT` is unset.
pub const DEFAULT_HEALTH_PORT: u16 = 10000;

/// Body returned by the liveness endpoint.
pub const HEALTH_BODY: &str = "Runner active";

/// Modules probed at startup so common imports skip the installer.
pub const WARM_UP_PACKAGES: &[&str] = &[
    "requests",
    "numpy",
    "pandas",
    "bs4",
    "yaml",
    "dateutil",
    "PIL",
    "matplotlib",
];

/// Default directory for per-request scratch space.
pub fn default_scratch_dir() -> std::path::PathBuf {
    std::env::temp_dir().join("pyrunner")
}
