// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact retrieval.
//!
//! Artifacts are addressed by name relative to the directory of a source
//! URL: `http://mirror/distfiles/a.tar.bz2` plus `b.tar.bz2` resolves to
//! `http://mirror/distfiles/b.tar.bz2`. A local copy short-circuits the
//! download.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from artifact retrieval
#[derive(Debug, Error)]
pub enum FetchError {
    /// The mirror answered 404. Expected, reported to the client.
    #[error("{0} not found")]
    NotFound(String),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for retrieving artifacts into a local directory
#[async_trait]
pub trait ArtifactFetcher: Send + Sync + 'static {
    /// Return the local path of `name`, downloading it from next to `url`
    /// into `dest_dir` only when it is not already there.
    async fn fetch(&self, name: &str, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// URL of `name` in the same directory as `url`.
pub fn sibling_url(url: &str, name: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, _)) => format!("{base}/{name}"),
        None => format!("{url}/{name}"),
    }
}

static DOWNLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Scratch name for one download of `name`, unique across processes and
/// concurrent jobs sharing `dest_dir`.
fn part_path(dest_dir: &Path, name: &str) -> PathBuf {
    let seq = DOWNLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
    dest_dir.join(format!("{name}.{}-{seq}.part", std::process::id()))
}

/// Fetcher backed by an HTTP client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn download(&self, file_url: &str, part_path: &Path) -> Result<u64, FetchError> {
        let mut response = self.client.get(file_url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(file_url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status { url: file_url.to_string(), status: status.as_u16() });
        }

        let mut file = tokio::fs::File::create(part_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, name: &str, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let path = dest_dir.join(name);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(name, path = %path.display(), "artifact already present");
            return Ok(path);
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let file_url = sibling_url(url, name);
        // Partial downloads never appear under the final name
        let part_path = part_path(dest_dir, name);
        tracing::info!(name, url = %file_url, "fetching artifact");

        let fetched = match self.download(&file_url, &part_path).await {
            // Rename replaces atomically, so a concurrent download of the
            // same artifact may land first without harm
            Ok(bytes) => {
                tokio::fs::rename(&part_path, &path).await.map(|()| bytes).map_err(FetchError::from)
            }
            Err(e) => Err(e),
        };
        match fetched {
            Ok(bytes) => {
                tracing::info!(name, bytes, path = %path.display(), "artifact fetched");
                Ok(path)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    tracing::info!(name, error = %e, "artifact fetched by another job");
                    return Ok(path);
                }
                tracing::warn!(name, url = %file_url, error = %e, "artifact fetch failed");
                Err(e)
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ArtifactFetcher, FetchError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tokio::sync::watch;

    #[derive(Default)]
    struct FakeFetchState {
        missing: HashSet<String>,
        broken: HashSet<String>,
        calls: Vec<String>,
    }

    /// Fake fetcher for testing.
    ///
    /// Every name resolves to a small local file unless marked missing or
    /// broken. The gate can be closed to hold fetches mid-flight.
    #[derive(Clone)]
    pub struct FakeFetcher {
        inner: Arc<Mutex<FakeFetchState>>,
        gate: Arc<watch::Sender<bool>>,
    }

    impl Default for FakeFetcher {
        fn default() -> Self {
            let (gate, _) = watch::channel(true);
            Self { inner: Arc::new(Mutex::new(FakeFetchState::default())), gate: Arc::new(gate) }
        }
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `name` with not-found
        pub fn missing(self, name: &str) -> Self {
            self.inner.lock().missing.insert(name.to_string());
            self
        }

        /// Answer `name` with a server error
        pub fn broken(self, name: &str) -> Self {
            self.inner.lock().broken.insert(name.to_string());
            self
        }

        /// Hold every fetch until [`FakeFetcher::open_gate`]
        pub fn close_gate(&self) {
            self.gate.send_replace(false);
        }

        pub fn open_gate(&self) {
            self.gate.send_replace(true);
        }

        /// Names requested so far, in order
        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl ArtifactFetcher for FakeFetcher {
        async fn fetch(&self, name: &str, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
            self.inner.lock().calls.push(name.to_string());

            let mut gate = self.gate.subscribe();
            // Sender lives as long as self
            let _ = gate.wait_for(|open| *open).await;

            let (missing, broken) = {
                let state = self.inner.lock();
                (state.missing.contains(name), state.broken.contains(name))
            };
            if missing {
                return Err(FetchError::NotFound(super::sibling_url(url, name)));
            }
            if broken {
                return Err(FetchError::Status { url: super::sibling_url(url, name), status: 500 });
            }

            let path = dest_dir.join(name);
            if !path.exists() {
                std::fs::create_dir_all(dest_dir)?;
                std::fs::write(&path, format!("fake:{name}"))?;
            }
            Ok(path)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFetcher;

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
