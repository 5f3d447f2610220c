//! The update checker state machine.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Waiting` | initial check | `Checking` |
//! | `Idle`, `Error` | auto-check tick or manual check | `Checking` |
//! | `Checking` | releases listed and scanned | `Idle` |
//! | `Checking` | any failure | `Error` |
//! | `Idle`, `Error` | download requested | `Downloading` |
//! | `Downloading` | download finished | `Idle` |
//! | `Downloading` | download failed | previous state |
//!
//! Only one check runs at a time: a check is refused while the state is
//! `Checking` or `Downloading`. Download failures return to the state the
//! checker was in before the download and never to `Error`, so they do not
//! block later checks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use humanly::{HumanDuration, HumanTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CheckerConfig;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::release::{ReleaseDescriptor, ReleaseProvider, select_best_update};
use crate::store::KeyValueStore;
use crate::throttle::{RateLimiter, now_timestamp};
use crate::version::Version;

/// Coarse state shown to the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CheckerState {
    /// No check has started yet.
    #[default]
    Waiting,
    Idle,
    Checking,
    Downloading,
    /// The last check failed. See [`CheckSession::last_error`].
    Error,
}

impl fmt::Display for CheckerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::Downloading => write!(f, "downloading"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What the checker has learned since the process started.
#[derive(Debug, Clone)]
pub struct CheckSession {
    pub current_version: Version,
    /// Newest release strictly above `current_version`, once one is found.
    pub best_known_release: Option<ReleaseDescriptor>,
    /// Where the best release was saved, once downloaded.
    pub downloaded_asset_path: Option<PathBuf>,
    /// Message of the most recent check or download failure.
    pub last_error: Option<String>,
}

impl CheckSession {
    fn new(current_version: Version) -> Self {
        Self {
            current_version,
            best_known_release: None,
            downloaded_asset_path: None,
            last_error: None,
        }
    }
}

/// Result of a single check attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another check or a download was in progress.
    Skipped(CheckerState),
    /// Another check started while this one was waiting out the minimum
    /// interval.
    Throttled,
    UpToDate,
    UpdateAvailable(ReleaseDescriptor),
    /// The check failed and the checker is now in [`CheckerState::Error`].
    Failed,
}

struct Inner {
    state: CheckerState,
    session: CheckSession,
}

/// How a check relates to the minimum interval.
#[derive(Debug, Clone, Copy)]
enum Gate {
    /// Manual or immediate check; never throttled.
    Forced,
    /// Delayed check that saw this stored timestamp before waiting.
    After(Option<i64>),
}

/// Whether presentation glue knows how to install `path`.
///
/// Only Unity packages can be imported in place.
pub fn can_be_installed(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("unitypackage"))
}

/// Polls a release provider for newer versions and stages the best one.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use release_checker::{CheckerConfig, FileStore, GitHubReleases, UpdateChecker};
///
/// #[tokio::main]
/// async fn main() -> release_checker::Result<()> {
///     let config = CheckerConfig::new("imagitama", "vrc-questifyer", "v1.0.0")
///         .allow_manual_check(true);
///
///     let checker = UpdateChecker::new(
///         config,
///         GitHubReleases::new()?,
///         Arc::new(FileStore::in_temp_dir()),
///     )?;
///
///     checker.check_with_delay().await;
///     println!("{}", checker.status_line());
///
///     if checker.available_release().is_some() {
///         let path = checker.download_available().await?;
///         println!("saved to {}", path.display());
///     }
///     Ok(())
/// }
/// ```
pub struct UpdateChecker<P> {
    config: CheckerConfig,
    provider: P,
    limiter: RateLimiter,
    downloader: Downloader,
    inner: Mutex<Inner>,
    auto_check: Mutex<Option<CancellationToken>>,
    started: AtomicBool,
}

impl<P: ReleaseProvider + 'static> UpdateChecker<P> {
    /// Creates a checker in the `Waiting` state.
    ///
    /// Nothing is requested until [`start`](Self::start) or one of the
    /// check methods is called.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid (including a malformed
    /// `current_version`) or no download directory can be determined.
    pub fn new(config: CheckerConfig, provider: P, store: Arc<dyn KeyValueStore>) -> Result<Arc<Self>> {
        let current_version = config.validate()?;
        let downloader = match &config.download_dir {
            Some(dir) => Downloader::new(dir)?,
            None => Downloader::for_downloads_dir()?,
        };
        let limiter = RateLimiter::new(store, config.min_seconds_between_checks);

        Ok(Arc::new(Self {
            config,
            provider,
            limiter,
            downloader,
            inner: Mutex::new(Inner {
                state: CheckerState::Waiting,
                session: CheckSession::new(current_version),
            }),
            auto_check: Mutex::new(None),
            started: AtomicBool::new(false),
        }))
    }

    /// Runs the startup sequence from the configuration: the initial check
    /// and the auto-check loop, each in the background.
    ///
    /// Only the first call does anything.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("checker already started");
            return;
        }

        if self.config.initial_check {
            info!("performing initial check");
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.check_with_delay().await;
            });
        } else {
            info!("skipping initial check");
        }

        if self.config.auto_check {
            self.start_auto_check();
        } else {
            info!("skipping auto-check");
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn state(&self) -> CheckerState {
        self.lock().state
    }

    /// Snapshot of the session.
    pub fn session(&self) -> CheckSession {
        self.lock().session.clone()
    }

    pub fn available_release(&self) -> Option<ReleaseDescriptor> {
        self.lock().session.best_known_release.clone()
    }

    pub fn downloaded_asset_path(&self) -> Option<PathBuf> {
        self.lock().session.downloaded_asset_path.clone()
    }

    /// Unix timestamp of the last recorded check, from the durable store.
    pub fn last_check_timestamp(&self) -> i64 {
        self.limiter.last_check(now_timestamp())
    }

    /// Whether presentation glue may offer to install the download:
    /// `allow_install` is set and the downloaded file is a Unity package.
    pub fn install_ready(&self) -> bool {
        self.config.allow_install
            && self
                .lock()
                .session
                .downloaded_asset_path
                .as_deref()
                .is_some_and(can_be_installed)
    }

    /// Waits out the rest of the minimum interval, then checks.
    ///
    /// Returns [`CheckOutcome::Throttled`] when another check started while
    /// this one was waiting.
    pub async fn check_with_delay(&self) -> CheckOutcome {
        let observed = self.wait_for_rate_limit().await;
        self.run_check(Gate::After(observed)).await
    }

    /// Sleeps until the minimum interval since the last check has passed.
    ///
    /// Returns the stored timestamp seen before sleeping.
    async fn wait_for_rate_limit(&self) -> Option<i64> {
        let observed = self.limiter.recorded_check();
        let now = now_timestamp();
        let wait = self.limiter.remaining_wait(now);
        if wait.is_zero() {
            return observed;
        }

        info!(
            seconds_since_last_check = self.limiter.elapsed(now),
            "waiting {} before checking",
            HumanTime::from(wait)
        );
        tokio::time::sleep(wait).await;
        debug!("wait complete, checking");
        observed
    }

    /// Checks immediately, without waiting for the minimum interval.
    ///
    /// Refused with [`CheckOutcome::Skipped`] while a check or download is
    /// already running.
    pub async fn check_now(&self) -> CheckOutcome {
        self.run_check(Gate::Forced).await
    }

    async fn run_check(&self, gate: Gate) -> CheckOutcome {
        if let Err(outcome) = self.begin_check(gate) {
            return outcome;
        }

        let result = self
            .provider
            .list_releases(&self.config.github_owner, &self.config.github_repo)
            .await
            .and_then(|releases| {
                let current = self.lock().session.current_version.clone();
                Ok(select_best_update(&releases, &current)?.cloned())
            });

        let mut inner = self.lock();
        match result {
            Ok(Some(release)) => {
                info!(tag = %release.tag, "version {} is available", release.tag);
                inner.session.best_known_release = Some(release.clone());
                inner.session.last_error = None;
                inner.state = CheckerState::Idle;
                CheckOutcome::UpdateAvailable(release)
            }
            Ok(None) => {
                info!(current = %inner.session.current_version, "no new version is available");
                inner.session.last_error = None;
                inner.state = CheckerState::Idle;
                CheckOutcome::UpToDate
            }
            Err(e) => {
                error!(error = %e, "update check failed");
                inner.session.last_error = Some(e.to_string());
                inner.state = CheckerState::Error;
                CheckOutcome::Failed
            }
        }
    }

    /// Moves to `Checking` and stamps the durable store, atomically with
    /// respect to other check attempts.
    ///
    /// A delayed check whose observed timestamp was replaced by another
    /// check inside the minimum interval is throttled.
    fn begin_check(&self, gate: Gate) -> std::result::Result<(), CheckOutcome> {
        let mut inner = self.lock();
        if matches!(inner.state, CheckerState::Checking | CheckerState::Downloading) {
            debug!(state = %inner.state, "check already in progress, skipping");
            return Err(CheckOutcome::Skipped(inner.state));
        }

        let now = now_timestamp();
        if let Gate::After(observed) = gate {
            if self.limiter.recorded_check() != observed && !self.limiter.interval_elapsed(now) {
                debug!("another check ran while waiting, skipping");
                return Err(CheckOutcome::Throttled);
            }
        }

        inner.state = CheckerState::Checking;
        if let Err(e) = self.limiter.record_check(now) {
            error!(error = %e, "cannot record check timestamp");
            inner.session.last_error = Some(e.to_string());
            inner.state = CheckerState::Error;
            return Err(CheckOutcome::Failed);
        }
        Ok(())
    }

    /// User-triggered check. Skips the wait but warns when the minimum
    /// interval has not passed yet.
    ///
    /// # Errors
    ///
    /// [`Error::ActionDisabled`] unless `allow_manual_check` is set.
    pub async fn manual_check(&self) -> Result<CheckOutcome> {
        if !self.config.allow_manual_check {
            return Err(Error::ActionDisabled("manual check"));
        }

        let now = now_timestamp();
        if !self.limiter.interval_elapsed(now) {
            warn!(
                seconds_since_last_check = self.limiter.elapsed(now),
                min_seconds = self.limiter.min_interval().as_secs(),
                "manually checking before the minimum interval has passed"
            );
        }

        Ok(self.check_now().await)
    }

    /// Downloads the best known release into the download directory.
    ///
    /// Allowed from `Idle` or `Error`. On failure the state returns to what
    /// it was and no path is recorded.
    pub async fn download_available(&self) -> Result<PathBuf> {
        if !self.config.allow_download {
            return Err(Error::ActionDisabled("download"));
        }

        let (release, prior) = {
            let mut inner = self.lock();
            let prior = inner.state;
            if !matches!(prior, CheckerState::Idle | CheckerState::Error) {
                return Err(Error::Busy(prior));
            }
            let release = inner
                .session
                .best_known_release
                .clone()
                .ok_or(Error::NoReleaseAvailable)?;
            inner.state = CheckerState::Downloading;
            (release, prior)
        };

        let result = self.downloader.download(&release).await;

        let mut inner = self.lock();
        match result {
            Ok(path) => {
                inner.session.downloaded_asset_path = Some(path.clone());
                inner.state = CheckerState::Idle;
                Ok(path)
            }
            Err(e) => {
                error!(tag = %release.tag, error = %e, "download failed");
                inner.session.last_error = Some(e.to_string());
                inner.state = prior;
                Err(e)
            }
        }
    }

    /// Starts the background auto-check loop.
    ///
    /// Returns `false` when a loop is already running.
    pub fn start_auto_check(self: &Arc<Self>) -> bool {
        let mut slot = self.auto_check_slot();
        if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
            debug!("auto-check already running");
            return false;
        }

        let interval = self.config.auto_check_interval();
        info!("starting auto-checking every {}ms", interval.as_millis());

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        let leading = !self.config.initial_check;
        tokio::spawn(auto_check_loop(Arc::downgrade(self), interval, leading, token));
        true
    }

    /// Stops the auto-check loop. A check already underway finishes.
    pub fn stop_auto_check(&self) {
        if let Some(token) = self.auto_check_slot().take() {
            info!("stopping auto-check");
            token.cancel();
        }
    }

    pub fn is_auto_checking(&self) -> bool {
        self.auto_check_slot()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// One-line description of the current state for display.
    pub fn status_line(&self) -> String {
        let inner = self.lock();
        match inner.state {
            CheckerState::Waiting => "Waiting to check for updates...".to_owned(),
            CheckerState::Checking => "Checking for updates...".to_owned(),
            CheckerState::Error => "Failed to check for updates".to_owned(),
            CheckerState::Downloading => "Downloading...".to_owned(),
            CheckerState::Idle => match &inner.session.best_known_release {
                None => "No new version is available".to_owned(),
                Some(release) => {
                    let mut line = format!("A newer version is available: {}", release.tag);
                    if let Some(date) = release.published_at {
                        line.push_str(&format!(" (released {})", pretty_date(date)));
                    }
                    if let Some(path) = &inner.session.downloaded_asset_path {
                        line.push_str(&format!(". Downloaded to {}", path.display()));
                    }
                    line
                }
            },
        }
    }
}

impl<P> UpdateChecker<P> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn auto_check_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.auto_check.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn force_state(&self, state: CheckerState) {
        self.lock().state = state;
    }
}

impl<P> Drop for UpdateChecker<P> {
    fn drop(&mut self) {
        if let Some(token) = self.auto_check_slot().take() {
            token.cancel();
        }
    }
}

/// Waits `interval`, then checks unless a download is running, until the
/// token is cancelled or the checker is dropped. With `leading` the first
/// check does not wait for the interval.
async fn auto_check_loop<P: ReleaseProvider + 'static>(
    checker: Weak<UpdateChecker<P>>,
    interval: Duration,
    leading: bool,
    cancel: CancellationToken,
) {
    let mut skip_sleep = leading;
    loop {
        if !std::mem::take(&mut skip_sleep) {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        let Some(checker) = checker.upgrade() else {
            break;
        };

        if checker.state() == CheckerState::Downloading {
            debug!("download in progress, skipping auto-check");
            continue;
        }

        let observed = tokio::select! {
            _ = cancel.cancelled() => break,
            observed = checker.wait_for_rate_limit() => observed,
        };
        checker.run_check(Gate::After(observed)).await;
    }

    debug!("auto-check loop stopped");
}

/// Formats a release date relative to now.
///
/// Dates more than a week old are shown in full.
fn pretty_date(the_datetime: DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(the_datetime);

    if diff.num_days() > 7 {
        return the_datetime.format("%x %X").to_string();
    }

    if diff.num_seconds() < 0 {
        let ahead = Duration::from_secs(diff.num_seconds().unsigned_abs());
        return format!("in {}", HumanTime::from(ahead));
    }

    let ago = Duration::from_secs(diff.num_seconds().unsigned_abs());
    HumanDuration::from(SystemTime::now().checked_sub(ago)).to_string()
}
