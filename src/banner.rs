//! Startup banner and usage text for the interactive front-end.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::consts::{AUTHOR, HOMEPAGE};

/// Service configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub python: &'a Path,
    pub health: SocketAddr,
    pub scratch_dir: &'a Path,
    pub run_timeout: Option<Duration>,
    pub message_limit: usize,
}

/// Print the startup banner with service info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║           P Y R U N N E R             ║
   ║    send a file, get its output back   ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   python    {}
   health    http://{}/health
   scratch   {}
   timeout   {}
   replies   {} bytes max
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        info.python.display(),
        info.health,
        info.scratch_dir.display(),
        timeout_label(info.run_timeout),
        info.message_limit,
    );
}

/// What `/start` prints.
pub fn usage_text() -> String {
    "Python runner\n\n\
     Enter the path of a .py file to run it.\n\
     Its imports are installed first. There is no run-time limit.\n\n\
     /cache  list packages known to be installed\n\
     quit    leave\n"
        .to_string()
}

fn timeout_label(timeout: Option<Duration>) -> String {
    match timeout {
        None => "none".to_string(),
        Some(limit) => format!("{}s", limit.as_secs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn print_banner_does_not_panic() {
        let info = BannerInfo {
            python: &PathBuf::from("python3"),
            health: "0.0.0.0:10000".parse().unwrap(),
            scratch_dir: &PathBuf::from("/tmp/pyrunner"),
            run_timeout: None,
            message_limit: 4000,
        };
        // Just verify it doesn't panic
        print_banner(&info);
    }

    #[test]
    fn usage_mentions_no_timeout() {
        assert!(usage_text().contains("no run-time limit"));
    }

    #[test]
    fn timeout_labels() {
        assert_eq!(timeout_label(None), "none");
        assert_eq!(timeout_label(Some(Duration::from_secs(90))), "90s");
    }
}
