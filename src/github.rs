//! Release lists from the GitHub REST API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::release::{AssetDescriptor, ReleaseDescriptor, ReleaseProvider};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("release-checker/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;

/// Release entry as returned by `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: Option<String>,
    name: Option<String>,
    zipball_url: Option<String>,
    html_url: Option<String>,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

impl GitHubRelease {
    /// A missing tag becomes an empty one so selection reports it.
    fn into_descriptor(self, owner: &str, repo: &str) -> ReleaseDescriptor {
        let tag = self.tag_name.unwrap_or_default();
        let page_url = self
            .html_url
            .or_else(|| (!tag.is_empty()).then(|| release_page_url(owner, repo, &tag)));

        ReleaseDescriptor {
            name: self.name,
            assets: self
                .assets
                .into_iter()
                .map(|a| AssetDescriptor {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
            source_archive_url: self.zipball_url.unwrap_or_default(),
            page_url,
            published_at: self.published_at,
            tag,
        }
    }
}

/// Web page of a tagged release on github.com.
pub fn release_page_url(owner: &str, repo: &str, tag: &str) -> String {
    format!("https://github.com/{owner}/{repo}/releases/tag/{tag}")
}

/// [`ReleaseProvider`] backed by the GitHub REST API.
///
/// Unauthenticated requests are limited to 60 per hour per IP, which is what
/// the checker's minimum interval guards against.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubReleases {
    pub fn new() -> Result<Self> {
        Self::with_api_base(API_BASE)
    }

    /// Talks to a different API root, e.g. a GitHub Enterprise host.
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
        })
    }

    async fn fetch_page(&self, owner: &str, repo: &str, page: usize) -> Result<Vec<GitHubRelease>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/releases?per_page={PER_PAGE}&page={page}",
            self.api_base
        );
        debug!(%url, page, "requesting release page");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            });
        }

        Ok(response.error_for_status()?.json().await?)
    }
}

impl ReleaseProvider for GitHubReleases {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseDescriptor>> {
        info!(owner, repo, "getting all releases");

        let mut releases = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(owner, repo, page).await?;
            let last = batch.len() < PER_PAGE;
            releases.extend(batch.into_iter().map(|r| r.into_descriptor(owner, repo)));
            if last {
                break;
            }
            page += 1;
        }

        info!(count = releases.len(), "found releases");
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"[
        {
            "tag_name": "v1.4.0",
            "name": "Spring update",
            "zipball_url": "https://api.github.com/repos/acme/tool/zipball/v1.4.0",
            "html_url": "https://github.com/acme/tool/releases/tag/v1.4.0",
            "published_at": "2024-03-01T12:00:00Z",
            "draft": false,
            "assets": [
                {"name": "tool-1.4.0.unitypackage", "browser_download_url": "https://github.com/acme/tool/releases/download/v1.4.0/tool-1.4.0.unitypackage", "size": 1024},
                {"name": "tool-1.4.0.zip", "browser_download_url": "https://github.com/acme/tool/releases/download/v1.4.0/tool-1.4.0.zip", "size": 2048}
            ]
        },
        {
            "tag_name": null,
            "name": null,
            "zipball_url": null,
            "html_url": null,
            "published_at": null
        }
    ]"#;

    fn parsed() -> Vec<ReleaseDescriptor> {
        let raw: Vec<GitHubRelease> = serde_json::from_str(PAYLOAD).unwrap();
        raw.into_iter()
            .map(|r| r.into_descriptor("acme", "tool"))
            .collect()
    }

    #[test]
    fn maps_release_fields() {
        let releases = parsed();
        let first = &releases[0];

        assert_eq!(first.tag, "v1.4.0");
        assert_eq!(first.display_name(), "Spring update");
        assert_eq!(first.assets.len(), 2);
        assert_eq!(first.assets[0].name, "tool-1.4.0.unitypackage");
        assert!(first.source_archive_url.ends_with("/zipball/v1.4.0"));
        assert_eq!(
            first.published_at.unwrap().to_rfc3339(),
            "2024-03-01T12:00:00+00:00"
        );
    }

    #[test]
    fn missing_tag_maps_to_empty() {
        let releases = parsed();
        assert_eq!(releases[1].tag, "");
        assert!(releases[1].assets.is_empty());
        assert!(releases[1].page_url.is_none());
    }

    #[test]
    fn page_url_is_built_when_absent() {
        let raw: GitHubRelease =
            serde_json::from_str(r#"{"tag_name": "v2.0.0", "html_url": null}"#).unwrap();
        let release = raw.into_descriptor("acme", "tool");
        assert_eq!(
            release.page_url.as_deref(),
            Some("https://github.com/acme/tool/releases/tag/v2.0.0")
        );
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let provider = GitHubReleases::with_api_base("https://ghe.example.com/api/v3/").unwrap();
        assert_eq!(provider.api_base, "https://ghe.example.com/api/v3");
    }
}
