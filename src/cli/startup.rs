//! Startup validation for Copernicus Connect
//!
//! Checks run before a command touches the network or the disk. The outcome
//! is returned as a [`StartupStatus`] value listing every failed check, so
//! commands decide for themselves which failures are fatal.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::app::quota::DownloadDirStore;
use crate::config::AppConfig;

/// Outcome of one startup check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl StartupCheck {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Results of startup validation checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupStatus {
    pub checks: Vec<StartupCheck>,
}

impl StartupStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, check: StartupCheck) {
        if check.passed {
            debug!("Startup check '{}' passed: {}", check.name, check.detail);
        } else {
            warn!("Startup check '{}' failed: {}", check.name, check.detail);
        }
        self.checks.push(check);
    }

    /// Checks that did not pass
    pub fn failures(&self) -> Vec<&StartupCheck> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn passed(&self, name: &str) -> bool {
        self.checks.iter().any(|c| c.name == name && c.passed)
    }

    /// Check if startup validation passed
    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Get a summary message for display
    pub fn summary(&self) -> String {
        if self.is_ready() {
            "System ready for operations".to_string()
        } else {
            let issues: Vec<String> = self
                .failures()
                .iter()
                .map(|c| format!("{} ({})", c.name, c.detail))
                .collect();
            format!("Setup required: {}", issues.join(", "))
        }
    }
}

pub const CHECK_CONFIG: &str = "configuration";
pub const CHECK_TOKEN: &str = "broker token";
pub const CHECK_DOWNLOAD_DIR: &str = "download directory";

/// Load the configuration and run every startup check
///
/// A configuration that cannot be loaded is reported as a failed check and
/// replaced by the defaults, so the remaining checks still run.
pub async fn validate_startup(config_file: Option<PathBuf>) -> (AppConfig, StartupStatus) {
    let mut status = StartupStatus::new();

    info!("Performing startup validation...");

    let config = match AppConfig::load(config_file).await {
        Ok(config) => {
            status.record(StartupCheck::pass(CHECK_CONFIG, "loaded"));
            config
        }
        Err(e) => {
            status.record(StartupCheck::fail(CHECK_CONFIG, e.to_string()));
            AppConfig::default()
        }
    };

    status.record(check_token(&config));

    let download_dir = DownloadDirStore::in_home().and_then(|store| store.load());
    match download_dir {
        Ok(dir) => status.record(check_download_dir(&dir).await),
        Err(e) => status.record(StartupCheck::fail(CHECK_DOWNLOAD_DIR, e.to_string())),
    }

    debug!("Startup validation completed: {}", status.summary());
    (config, status)
}

/// Whether a broker token is configured
pub fn check_token(config: &AppConfig) -> StartupCheck {
    match &config.catalog.token {
        Some(_) => StartupCheck::pass(CHECK_TOKEN, "configured"),
        None => StartupCheck::fail(CHECK_TOKEN, "set HDA_TOKEN or catalog.token"),
    }
}

/// Whether `dir` exists or can be created
pub async fn check_download_dir(dir: &Path) -> StartupCheck {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => StartupCheck::pass(CHECK_DOWNLOAD_DIR, dir.display().to_string()),
        Err(e) => StartupCheck::fail(
            CHECK_DOWNLOAD_DIR,
            format!("{} cannot be created: {}", dir.display(), e),
        ),
    }
}

/// Print the status as a short table
pub fn show_startup_status(status: &StartupStatus) {
    for check in &status.checks {
        let mark = if check.passed { "ok" } else { "FAILED" };
        println!("  {:<20} {:<7} {}", check.name, mark, check.detail);
    }
    println!();
    println!("{}", status.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summary_lists_failures() {
        let mut status = StartupStatus::new();
        status.record(StartupCheck::pass(CHECK_CONFIG, "loaded"));
        assert!(status.is_ready());

        status.record(StartupCheck::fail(CHECK_TOKEN, "missing"));
        assert!(!status.is_ready());
        assert!(status.passed(CHECK_CONFIG));
        assert!(!status.passed(CHECK_TOKEN));
        assert_eq!(status.failures().len(), 1);
        assert_eq!(status.summary(), "Setup required: broker token (missing)");
    }

    #[test]
    fn test_token_check() {
        let mut config = AppConfig::default();
        assert!(!check_token(&config).passed);
        config.catalog.token = Some("abc".to_string());
        assert!(check_token(&config).passed);
    }

    #[tokio::test]
    async fn test_download_dir_check() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        assert!(check_download_dir(&nested).await.passed);
        assert!(nested.is_dir());

        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(!check_download_dir(&blocker.join("sub")).await.passed);
    }
}
