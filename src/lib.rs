//! # release-checker
//!
//! A Rust library that checks GitHub releases for newer versions of your
//! software and downloads the newest release asset.
//!
//! **release-checker** respects GitHub's request quota: checks are spaced by a
//! minimum interval that survives restarts, and automatic checking is off by
//! default.
//!
//! # Quick Start
//!
//! Run the following command to add release-checker to your project's dependencies:
//!
//! ```shell
//! cargo add release-checker
//! ```
//!
//! # Usage
//!
//! ## Basic
//!
//! Build an [`UpdateChecker`] and let [`UpdateChecker::start`] perform the
//! initial check in the background:
//!
//! ```no_run
//! use std::sync::Arc;
//! use release_checker::{CheckerConfig, FileStore, GitHubReleases, UpdateChecker};
//!
//! #[tokio::main]
//! async fn main() -> release_checker::Result<()> {
//!     let config = CheckerConfig::new("my-org", "my-tool", env!("CARGO_PKG_VERSION"));
//!
//!     let checker = UpdateChecker::new(
//!         config,
//!         GitHubReleases::new()?,
//!         Arc::new(FileStore::in_temp_dir()),
//!     )?;
//!     checker.start();
//!
//!     // Your application code here...
//!
//!     println!("{}", checker.status_line());
//!     Ok(())
//! }
//! ```
//!
//! Once a check finds something, the status line reads:
//! ```text
//! A newer version is available: v1.2.0 (released 3 days ago)
//! ```
//!
//! ## Advanced
//!
//! Automatic checking, manual checks and downloads are all switched through
//! [`CheckerConfig`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use release_checker::{CheckOutcome, CheckerConfig, FileStore, GitHubReleases, UpdateChecker};
//!
//! #[tokio::main]
//! async fn main() -> release_checker::Result<()> {
//!     let config = CheckerConfig::new("my-org", "my-tool", "v1.0.0")
//!         .initial_check(false)
//!         .auto_check(true)
//!         .auto_check_interval_ms(15 * 60 * 1000)
//!         .allow_manual_check(true);
//!
//!     let checker = UpdateChecker::new(
//!         config,
//!         GitHubReleases::new()?,
//!         Arc::new(FileStore::in_temp_dir()),
//!     )?;
//!     checker.start();
//!
//!     if let CheckOutcome::UpdateAvailable(release) = checker.manual_check().await? {
//!         println!("Update available: {}", release.tag);
//!         let path = checker.download_available().await?;
//!         println!("Saved to {}", path.display());
//!     }
//!
//!     checker.stop_auto_check();
//!     Ok(())
//! }
//! ```
//!
//! ## Picking an update yourself
//!
//! ```
//! use release_checker::{select_best_update, ReleaseDescriptor, Version};
//!
//! let releases = vec![
//!     ReleaseDescriptor::new("v0.9.0", "https://example.com/0.9.0.zip"),
//!     ReleaseDescriptor::new("v1.1.0", "https://example.com/1.1.0.zip"),
//! ];
//! let current = Version::parse("1.0").unwrap();
//!
//! let best = select_best_update(&releases, &current).unwrap();
//! assert_eq!(best.map(|r| r.tag.as_str()), Some("v1.1.0"));
//! ```
//!
//! # Rate Limiting
//!
//! Unauthenticated GitHub requests are limited to 60 per hour per IP:
//!
//! - **Minimum interval**: 60 seconds between checks by default
//! - **Cadence**: the timestamp is recorded when a check starts
//! - **Storage**: `{temp_dir}/release_checker_state.bin` with [`FileStore`],
//!   in postcard's compact binary format
//!
//! Manual checks skip the wait but log a warning when they come too early.
//!
//! # Logging
//!
//! Everything is reported through [`tracing`]. Install a subscriber in your
//! application to see it.
//!

mod checker;
mod config;
mod download;
mod error;
mod github;
mod release;
mod store;
pub mod throttle;
mod version;

#[cfg(test)]
mod test_support;

pub use checker::{CheckOutcome, CheckSession, CheckerState, UpdateChecker, can_be_installed};
pub use config::{CheckerConfig, DEFAULT_AUTO_CHECK_INTERVAL_MS};
pub use download::{DownloadPlan, Downloader, downloads_dir, plan_download};
pub use error::{Error, Result};
pub use github::{GitHubReleases, release_page_url};
pub use release::{AssetDescriptor, ReleaseDescriptor, ReleaseProvider, select_best_update};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use throttle::RateLimiter;
pub use version::{Version, compare};

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    #[test]
    fn test_version_parsing() {
        assert!(Version::parse("2.4.1").unwrap() > Version::parse("2.4.0").unwrap());
        assert!(Version::parse("v2.0").unwrap() > Version::parse("1.9.9").unwrap());
        assert!(Version::parse("1.1.1").unwrap() > Version::parse("1.1.0").unwrap());
        assert_eq!(Version::parse("v1.2.3").unwrap(), Version::parse("1.2.3").unwrap());
    }

    #[test]
    fn test_compare_matches_integer_components() {
        let pairs = [
            ("1.0.0", "1.0.0", Ordering::Equal),
            ("1.0", "1.0.0.0", Ordering::Equal),
            ("1.2.10", "1.2.9", Ordering::Greater),
            ("0.10", "0.9.99", Ordering::Greater),
            ("10.0", "9.99.99", Ordering::Greater),
            ("1.0.0", "1.0.0.1", Ordering::Less),
        ];

        for (a, b, expected) in pairs {
            assert_eq!(compare(a, b).unwrap(), expected, "{a} vs {b}");
            assert_eq!(compare(b, a).unwrap(), expected.reverse(), "{b} vs {a}");
        }
    }

    #[test]
    fn test_malformed_versions() {
        assert!(matches!(Version::parse(""), Err(Error::Parse { .. })));
        assert!(matches!(Version::parse("abc"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_basic_selection() {
        let releases = vec![
            ReleaseDescriptor::new("v1.0.0", "a"),
            ReleaseDescriptor::new("v2.0.0", "b"),
            ReleaseDescriptor::new("v1.5.0", "c"),
        ];
        let current = Version::parse("v1.0.0").unwrap();

        let best = select_best_update(&releases, &current).unwrap().unwrap();
        assert_eq!(best.tag, "v2.0.0");
        assert_eq!(best.source_archive_url, "b");
    }
}
