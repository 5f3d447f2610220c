//! Fetching a release's asset to local storage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::ACCEPT;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::release::ReleaseDescriptor;

const USER_AGENT: &str = concat!("release-checker/", env!("CARGO_PKG_VERSION"));

/// What to fetch for a release and what to call it locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub url: String,
    pub file_name: String,
}

/// Chooses the file to download.
///
/// The first listed asset wins. Without assets, the source archive is used
/// and saved as `{tag}.zip`.
pub fn plan_download(release: &ReleaseDescriptor) -> DownloadPlan {
    match release.assets.first() {
        Some(asset) => {
            debug!(asset = %asset.name, "using first asset");
            DownloadPlan {
                url: asset.download_url.clone(),
                file_name: local_file_name(&asset.name),
            }
        }
        None => {
            debug!(tag = %release.tag, "release has no assets, using source archive");
            DownloadPlan {
                url: release.source_archive_url.clone(),
                file_name: local_file_name(&format!("{}.zip", release.tag)),
            }
        }
    }
}

/// Last path component of `name`, so a remote name cannot escape the
/// destination directory.
fn local_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "download".to_owned())
}

/// Platform downloads directory of the current user.
pub fn downloads_dir() -> Result<PathBuf> {
    dirs::download_dir().ok_or(Error::NoDownloadsDir)
}

/// Streams release assets into a directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    dest_dir: PathBuf,
}

impl Downloader {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            dest_dir: dest_dir.into(),
        })
    }

    /// Downloader saving into [`downloads_dir`].
    pub fn for_downloads_dir() -> Result<Self> {
        Self::new(downloads_dir()?)
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Downloads the chosen asset of `release` and returns its local path.
    ///
    /// An existing file at the destination is deleted first. On failure any
    /// partially written file is removed.
    pub async fn download(&self, release: &ReleaseDescriptor) -> Result<PathBuf> {
        info!(
            release = %release.display_name(),
            assets = release.assets.len(),
            "downloading release"
        );

        let plan = plan_download(release);
        let dest = self.dest_dir.join(&plan.file_name);

        if fs::try_exists(&dest).await.map_err(|e| Error::fs(&dest, e))? {
            info!(path = %dest.display(), "file already exists, deleting");
            fs::remove_file(&dest).await.map_err(|e| Error::fs(&dest, e))?;
        }

        match self.fetch(&plan.url, &dest).await {
            Ok(bytes) => {
                info!(path = %dest.display(), bytes, "file has been downloaded");
                Ok(dest)
            }
            Err(e) => {
                match fs::remove_file(&dest).await {
                    Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                        warn!(path = %dest.display(), error = %cleanup, "cannot remove partial download");
                    }
                    _ => {}
                }
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await?
            .error_for_status()?;

        debug!(destination = %dest.display(), "streaming response");

        fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|e| Error::fs(&self.dest_dir, e))?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await
            .map_err(|e| Error::fs(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(|e| Error::fs(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::fs(dest, e))?;

        Ok(written)
    }
}
