// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sd_adapters::{DeltupGenerator, FetchError, HttpFetcher};
use sd_core::SystemClock;
use sd_engine::{ArtifactLayout, JobController, Pipeline};
use sd_storage::{RecordStore, StoreError};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::env;

/// Where job workers run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Re-execute this binary as `servedelta worker …`
    Process,
    /// Tokio task inside the serving process
    Task,
}

impl FromStr for WorkerMode {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process" => Ok(WorkerMode::Process),
            "task" => Ok(WorkerMode::Task),
            other => Err(LifecycleError::InvalidConfig("SERVEDELTA_WORKER_MODE", other.to_string())),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State root (e.g. /opt/servedelta)
    pub root_dir: PathBuf,
    pub bind: SocketAddr,
    /// Base URL of the static server publishing `artifacts_dir`
    pub files_url: String,
    /// Per-client job records
    pub records_dir: PathBuf,
    /// Finished deltas
    pub artifacts_dir: PathBuf,
    pub sources_read_dir: PathBuf,
    pub sources_write_dir: PathBuf,
    pub deltup: PathBuf,
    pub deltup_level: u8,
    pub generate_timeout: Duration,
    pub fetch_timeout: Duration,
    pub worker_mode: WorkerMode,
    /// Shared by the server and its workers
    pub log_path: PathBuf,
    /// Instance lock / PID file
    pub lock_path: PathBuf,
}

impl Config {
    /// Load configuration from `SERVEDELTA_*` environment variables.
    pub fn load() -> Result<Self, LifecycleError> {
        let mut config = Self::for_root(env::root_dir());
        config.bind = env::bind_addr()?;
        config.files_url = env::files_url();
        if let Some(dir) = env::sources_read_dir() {
            config.sources_read_dir = dir;
        }
        if let Some(dir) = env::sources_write_dir() {
            config.sources_write_dir = dir;
        }
        config.deltup = env::deltup_program();
        config.deltup_level = env::deltup_level()?;
        config.generate_timeout = env::generate_timeout();
        config.fetch_timeout = env::fetch_timeout();
        config.worker_mode = env::worker_mode()?;
        Ok(config)
    }

    /// Default configuration rooted at `root_dir`, ignoring the environment.
    pub fn for_root(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 7500)),
            files_url: "http://localhost:7580/files/dtu".to_string(),
            records_dir: root_dir.join("proc"),
            artifacts_dir: root_dir.join("files").join("dtu"),
            sources_read_dir: root_dir.join("files"),
            sources_write_dir: root_dir.join("files"),
            deltup: PathBuf::from("/usr/bin/deltup"),
            deltup_level: 9,
            generate_timeout: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(10 * 60),
            worker_mode: WorkerMode::Process,
            log_path: root_dir.join("servedelta.log"),
            lock_path: root_dir.join("servedelta.pid"),
            root_dir,
        }
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.sources_write_dir, &self.artifacts_dir)
    }

    pub fn record_store(&self) -> Result<RecordStore, LifecycleError> {
        Ok(RecordStore::open(&self.records_dir)?)
    }

    /// Pipeline wired to the real fetcher and generator.
    pub fn pipeline(&self) -> Result<Pipeline<SystemClock>, LifecycleError> {
        let fetcher = HttpFetcher::new(self.fetch_timeout)?;
        let generator = DeltupGenerator::new(&self.deltup, &self.sources_read_dir, &self.sources_write_dir)
            .level(self.deltup_level)
            .timeout(self.generate_timeout);
        Ok(Pipeline::new(
            self.record_store()?,
            Arc::new(fetcher),
            Arc::new(generator),
            self.layout(),
            SystemClock,
        ))
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Result of daemon startup: the state plus what the server needs.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: TcpListener,
    pub controller: Arc<JobController<SystemClock>>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully.
    ///
    /// Running workers are left alone; their records stay valid and the
    /// next server picks them up through the liveness check.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock file is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Invalid value for {0}: {1:?}")]
    InvalidConfig(&'static str, String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
