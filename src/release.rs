//! Releases, their assets, and picking the best update among them.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::version::Version;

/// A single downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    pub download_url: String,
}

/// A tagged, published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Tag name, such as `v1.2.3`. Must not be empty.
    pub tag: String,
    /// Display name, when the release has one.
    pub name: Option<String>,
    /// Attached assets in the order the host lists them.
    pub assets: Vec<AssetDescriptor>,
    /// Archive of the tagged source, used when there are no assets.
    pub source_archive_url: String,
    /// Web page of the release.
    pub page_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ReleaseDescriptor {
    pub fn new(tag: impl Into<String>, source_archive_url: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
            assets: Vec::new(),
            source_archive_url: source_archive_url.into(),
            page_url: None,
            published_at: None,
        }
    }

    pub fn with_asset(mut self, name: impl Into<String>, download_url: impl Into<String>) -> Self {
        self.assets.push(AssetDescriptor {
            name: name.into(),
            download_url: download_url.into(),
        });
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Name to show for this release: its display name, else its tag.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.tag)
    }
}

/// Source of release lists for an `owner/repo` pair.
pub trait ReleaseProvider: Send + Sync {
    /// Lists every published release of `owner/repo`.
    ///
    /// Fails with [`Error::Network`] or [`Error::NotFound`].
    fn list_releases(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl Future<Output = Result<Vec<ReleaseDescriptor>>> + Send;
}

/// Finds the highest release strictly newer than `current`.
///
/// Every release is inspected. A release with an empty tag or an unparsable
/// tag fails the whole selection. Among equal versions the later one wins.
///
/// # Examples
///
/// ```
/// use release_checker::{select_best_update, ReleaseDescriptor, Version};
///
/// let releases = vec![
///     ReleaseDescriptor::new("v1.0.0", "https://example.com/1.0.0.zip"),
///     ReleaseDescriptor::new("v2.0.0", "https://example.com/2.0.0.zip"),
///     ReleaseDescriptor::new("v1.5.0", "https://example.com/1.5.0.zip"),
/// ];
/// let current = Version::parse("v1.0.0").unwrap();
///
/// let best = select_best_update(&releases, &current).unwrap().unwrap();
/// assert_eq!(best.tag, "v2.0.0");
/// ```
pub fn select_best_update<'a>(
    releases: &'a [ReleaseDescriptor],
    current: &Version,
) -> Result<Option<&'a ReleaseDescriptor>> {
    let mut best_so_far = current.clone();
    let mut candidate = None;

    for (index, release) in releases.iter().enumerate() {
        if release.tag.trim().is_empty() {
            return Err(Error::MissingTag { index });
        }

        let version = Version::parse(&release.tag)?;
        if version > best_so_far {
            debug!(tag = %release.tag, "new best candidate");
            best_so_far = version;
            candidate = Some(release);
        } else if candidate.is_some() && version == best_so_far {
            candidate = Some(release);
        }
    }

    Ok(candidate)
}
