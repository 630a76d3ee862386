// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::{LifecycleError, WorkerMode};

/// Build version (from Cargo.toml and git)
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(var(name).and_then(|s| s.parse::<u64>().ok()).unwrap_or(default))
}

/// State root: `SERVEDELTA_ROOT`, default `/opt/servedelta`
pub fn root_dir() -> PathBuf {
    var("SERVEDELTA_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/opt/servedelta"))
}

/// Listen address (`SERVEDELTA_BIND`, default 127.0.0.1:7500)
pub fn bind_addr() -> Result<SocketAddr, LifecycleError> {
    let raw = var("SERVEDELTA_BIND").unwrap_or_else(|| "127.0.0.1:7500".to_string());
    raw.parse().map_err(|_| LifecycleError::InvalidConfig("SERVEDELTA_BIND", raw))
}

/// Base URL finished deltas are served from. No trailing slash.
pub fn files_url() -> String {
    let url = var("SERVEDELTA_FILES_URL")
        .unwrap_or_else(|| "http://localhost:7580/files/dtu".to_string());
    url.trim_end_matches('/').to_string()
}

/// Directory deltup reads source artifacts from (`-D`)
pub fn sources_read_dir() -> Option<PathBuf> {
    var("SERVEDELTA_SOURCES_READ_DIR").map(PathBuf::from)
}

/// Directory fetched artifacts land in (deltup `-d`)
pub fn sources_write_dir() -> Option<PathBuf> {
    var("SERVEDELTA_SOURCES_WRITE_DIR").map(PathBuf::from)
}

pub fn deltup_program() -> PathBuf {
    var("SERVEDELTA_DELTUP").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/usr/bin/deltup"))
}

/// Compression level for deltup `-g` (default 9)
pub fn deltup_level() -> Result<u8, LifecycleError> {
    match var("SERVEDELTA_DELTUP_LEVEL") {
        None => Ok(9),
        Some(raw) => raw
            .parse::<u8>()
            .map_err(|_| LifecycleError::InvalidConfig("SERVEDELTA_DELTUP_LEVEL", raw)),
    }
}

/// Generator timeout (default 1h, `SERVEDELTA_GENERATE_TIMEOUT_SECS`)
pub fn generate_timeout() -> Duration {
    secs("SERVEDELTA_GENERATE_TIMEOUT_SECS", 60 * 60)
}

/// Per-artifact download timeout (default 10m, `SERVEDELTA_FETCH_TIMEOUT_SECS`)
pub fn fetch_timeout() -> Duration {
    secs("SERVEDELTA_FETCH_TIMEOUT_SECS", 10 * 60)
}

/// How workers run: `process` (default) or `task`
pub fn worker_mode() -> Result<WorkerMode, LifecycleError> {
    match var("SERVEDELTA_WORKER_MODE") {
        None => Ok(WorkerMode::Process),
        Some(raw) => raw.parse(),
    }
}
