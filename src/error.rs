//! Error types for release checking and downloading.

use std::path::PathBuf;

/// Everything that can go wrong while checking for or staging a release.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A version string could not be read as a dotted numeric version.
    #[error("invalid version {input:?}: {reason}")]
    Parse { input: String, reason: String },

    /// A release in the list has no tag name.
    #[error("release #{index} does not have a tag name")]
    MissingTag { index: usize },

    /// The release list or an asset could not be fetched.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The hosting service does not know the repository.
    #[error("no releases found for {owner}/{repo}")]
    NotFound { owner: String, repo: String },

    /// A local file could not be written or deleted.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The durable store could not persist a value.
    #[error("store error: {0}")]
    Store(String),

    /// No platform downloads directory and no override configured.
    #[error("cannot determine a downloads directory")]
    NoDownloadsDir,

    /// The checker configuration is unusable.
    #[error("config error: {0}")]
    Config(String),

    /// A download was requested before any newer release was found.
    #[error("no newer release is available to download")]
    NoReleaseAvailable,

    /// The action is switched off in the configuration.
    #[error("{0} is disabled by configuration")]
    ActionDisabled(&'static str),

    /// The checker is already checking or downloading.
    #[error("checker is busy ({0})")]
    Busy(crate::checker::CheckerState),
}

impl Error {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
