use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::throttle::DEFAULT_MIN_SECONDS_BETWEEN_CHECKS;
use crate::version::Version;

/// Default time between automatic checks (1 minute).
pub const DEFAULT_AUTO_CHECK_INTERVAL_MS: u64 = 60_000;

/// Options recognised by [`UpdateChecker`](crate::UpdateChecker).
///
/// Automatic and manual checks are off by default: unauthenticated GitHub
/// requests are capped at 60 per hour per IP.
///
/// # Examples
///
/// ```
/// use release_checker::CheckerConfig;
///
/// let config = CheckerConfig::new("imagitama", "vrc-questifyer", "v1.0.0")
///     .allow_manual_check(true)
///     .allow_install(false);
///
/// assert!(config.initial_check);
/// assert!(!config.auto_check);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub github_owner: String,
    pub github_repo: String,
    /// Version currently running, e.g. `v1.2.3`.
    pub current_version: String,
    /// Check once at startup.
    pub initial_check: bool,
    /// Keep checking every `auto_check_interval_ms`.
    pub auto_check: bool,
    pub allow_manual_check: bool,
    pub allow_download: bool,
    pub allow_install: bool,
    pub auto_check_interval_ms: u64,
    pub min_seconds_between_checks: u64,
    /// Where assets are saved. Defaults to the platform downloads directory.
    pub download_dir: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            github_owner: String::new(),
            github_repo: String::new(),
            current_version: String::new(),
            initial_check: true,
            auto_check: false,
            allow_manual_check: false,
            allow_download: true,
            allow_install: true,
            auto_check_interval_ms: DEFAULT_AUTO_CHECK_INTERVAL_MS,
            min_seconds_between_checks: DEFAULT_MIN_SECONDS_BETWEEN_CHECKS,
            download_dir: None,
        }
    }
}

impl CheckerConfig {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            github_owner: owner.into(),
            github_repo: repo.into(),
            current_version: current_version.into(),
            ..Self::default()
        }
    }

    pub fn initial_check(mut self, enabled: bool) -> Self {
        self.initial_check = enabled;
        self
    }

    pub fn auto_check(mut self, enabled: bool) -> Self {
        self.auto_check = enabled;
        self
    }

    pub fn allow_manual_check(mut self, allowed: bool) -> Self {
        self.allow_manual_check = allowed;
        self
    }

    pub fn allow_download(mut self, allowed: bool) -> Self {
        self.allow_download = allowed;
        self
    }

    pub fn allow_install(mut self, allowed: bool) -> Self {
        self.allow_install = allowed;
        self
    }

    pub fn auto_check_interval_ms(mut self, ms: u64) -> Self {
        self.auto_check_interval_ms = ms;
        self
    }

    pub fn min_seconds_between_checks(mut self, secs: u64) -> Self {
        self.min_seconds_between_checks = secs;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn auto_check_interval(&self) -> Duration {
        Duration::from_millis(self.auto_check_interval_ms)
    }

    /// Checks the options and parses the running version.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a blank owner or repository, [`Error::Parse`]
    /// when the current version is malformed.
    pub fn validate(&self) -> Result<Version> {
        if self.github_owner.trim().is_empty() {
            return Err(Error::Config("github_owner must be set".to_owned()));
        }
        if self.github_repo.trim().is_empty() {
            return Err(Error::Config("github_repo must be set".to_owned()));
        }
        if self.auto_check && self.auto_check_interval_ms == 0 {
            return Err(Error::Config(
                "auto_check_interval_ms must be positive when auto_check is on".to_owned(),
            ));
        }
        Version::parse(&self.current_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CheckerConfig::default();
        assert!(config.initial_check);
        assert!(!config.auto_check);
        assert!(!config.allow_manual_check);
        assert!(config.allow_download);
        assert!(config.allow_install);
        assert_eq!(config.auto_check_interval(), Duration::from_secs(60));
        assert_eq!(config.min_seconds_between_checks, 60);
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: CheckerConfig = serde_json::from_str(
            r#"{
                "github_owner": "imagitama",
                "github_repo": "webextension-boilerplate",
                "current_version": "v1.0.0",
                "allow_manual_check": true,
                "allow_install": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.github_repo, "webextension-boilerplate");
        assert!(config.allow_manual_check);
        assert!(!config.allow_install);
        assert!(config.initial_check);
        assert_eq!(config.auto_check_interval_ms, DEFAULT_AUTO_CHECK_INTERVAL_MS);
    }

    #[test]
    fn validate_requires_repository() {
        let err = CheckerConfig::new("owner", " ", "1.0").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = CheckerConfig::new("", "repo", "1.0").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_version() {
        let err = CheckerConfig::new("owner", "repo", "latest").validate().unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn validate_rejects_zero_auto_interval() {
        let config = CheckerConfig::new("owner", "repo", "1.0")
            .auto_check(true)
            .auto_check_interval_ms(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_returns_running_version() {
        let version = CheckerConfig::new("owner", "repo", "v2.1").validate().unwrap();
        assert_eq!(version.to_string(), "2.1");
    }
}
