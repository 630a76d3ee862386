// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use sd_adapters::{ProcessLauncher, WorkerLauncher};
use sd_core::SystemClock;
use sd_engine::{JobController, TaskLauncher};
use tokio::net::TcpListener;
use tracing::info;

use super::{Config, DaemonState, LifecycleError, StartupResult, WorkerMode};

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // A held lock means the pid file belongs to the running server
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Startup proper; the caller cleans up when this fails.
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. State root holds the lock file
    std::fs::create_dir_all(&config.root_dir)?;

    // 2. Take the instance lock before touching anything else.
    // Truncating on open would wipe a running server's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Record, artifact and source directories
    std::fs::create_dir_all(&config.records_dir)?;
    std::fs::create_dir_all(&config.artifacts_dir)?;
    std::fs::create_dir_all(&config.sources_write_dir)?;

    // 4. Set up the worker launcher
    let launcher: Arc<dyn WorkerLauncher> = match config.worker_mode {
        WorkerMode::Process => {
            let exe = std::env::current_exe()?;
            Arc::new(ProcessLauncher::new(exe, ["worker"]))
        }
        WorkerMode::Task => Arc::new(TaskLauncher::new(Arc::new(config.pipeline()?))),
    };
    let controller = Arc::new(JobController::new(
        config.record_store()?,
        launcher,
        config.layout(),
        SystemClock,
    ));

    // 5. Bind last so a misconfigured server never accepts requests
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.bind, e))?;

    info!(
        root = %config.root_dir.display(),
        bind = %listener.local_addr()?,
        worker_mode = ?config.worker_mode,
        "daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState { config: config.clone(), lock_file },
        listener,
        controller,
    })
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
