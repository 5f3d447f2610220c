//! Fakes shared by the unit tests.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{Error, Result};
use crate::release::{ReleaseDescriptor, ReleaseProvider};

/// Provider that answers every request with a fixed list, or fails.
pub struct StaticReleases {
    releases: Mutex<Option<Vec<ReleaseDescriptor>>>,
    calls: AtomicUsize,
}

impl StaticReleases {
    pub fn new(releases: Vec<ReleaseDescriptor>) -> Self {
        Self {
            releases: Mutex::new(Some(releases)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Provider whose repository does not exist.
    pub fn failing() -> Self {
        Self {
            releases: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, releases: Vec<ReleaseDescriptor>) {
        *self.releases.lock().unwrap() = Some(releases);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReleaseProvider for StaticReleases {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let releases = self.releases.lock().unwrap().clone();
        releases.ok_or_else(|| Error::NotFound {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }
}

/// A one-shot HTTP server and the raw request it received.
pub struct OneShotServer {
    pub url: String,
    pub request: JoinHandle<String>,
}

/// Serves `body` once with a 200 response on an ephemeral local port.
pub async fn serve_once(body: Vec<u8>) -> OneShotServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let request = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&raw).into_owned()
    });

    OneShotServer { url, request }
}

/// Log lines written by a test subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Installs a subscriber recording `WARN` and above on this thread.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
