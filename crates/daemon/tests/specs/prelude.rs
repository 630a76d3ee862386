// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for driving the binary.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Output, Stdio};
use std::time::{Duration, Instant};

pub use sd_core::{ClientKey, JobId, JobRecord, JobStatus, SystemClock};
pub use sd_storage::RecordStore;
pub use tempfile::TempDir;

pub const BIN: &str = env!("CARGO_BIN_EXE_servedelta");

/// `servedelta` with a scrubbed environment rooted at `root`.
pub fn cli_in(root: &Path) -> Cli {
    let mut cmd = assert_cmd::Command::new(BIN);
    cmd.env_clear()
        .env("PATH", std::env::var_os("PATH").unwrap_or_default())
        .env("SERVEDELTA_ROOT", root);
    Cli { cmd }
}

/// `servedelta` for commands that never touch the state root.
pub fn cli() -> Cli {
    let mut cmd = assert_cmd::Command::new(BIN);
    cmd.env_clear();
    Cli { cmd }
}

pub struct Cli {
    cmd: assert_cmd::Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Run and require exit status 0.
    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        assert!(output.status.success(), "expected success, got {:?}\n{}", output.status, describe(&output));
        RunAssert { output }
    }

    /// Run and require a non-zero exit status.
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        assert!(!output.status.success(), "expected failure\n{}", describe(&output));
        RunAssert { output }
    }
}

fn describe(output: &Output) -> String {
    format!(
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = String::from_utf8_lossy(&self.output.stdout);
        assert!(stdout.contains(needle), "stdout missing {needle:?}:\n{stdout}");
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = String::from_utf8_lossy(&self.output.stderr);
        assert!(stderr.contains(needle), "stderr missing {needle:?}:\n{stderr}");
        self
    }
}

/// Write an executable shell script.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn free_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A `servedelta serve` child process.
pub struct Server {
    child: Child,
    pub addr: SocketAddr,
    pub root: PathBuf,
}

impl Server {
    pub fn start(root: &Path, env: &[(&str, &str)]) -> Server {
        let addr = free_port();
        let mut cmd = std::process::Command::new(BIN);
        cmd.env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("SERVEDELTA_ROOT", root)
            .args(["serve", "--bind", &addr.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in env {
            cmd.env(key, value);
        }
        let child = cmd.spawn().unwrap();
        let server = Server { child, addr, root: root.to_path_buf() };
        server.wait_ready();
        server
    }

    fn wait_ready(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if TcpStream::connect(self.addr).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("server never accepted connections on {}", self.addr);
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    /// Send SIGTERM and wait for a clean exit.
    pub fn stop(&mut self) -> std::process::ExitStatus {
        let pid = self.child.id().to_string();
        std::process::Command::new("kill").args(["-TERM", &pid]).status().unwrap();
        self.child.wait().unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// HTTP client that reports redirects instead of following them.
pub fn http() -> reqwest::Client {
    reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

/// Serve `files` under `/distfiles/` on an ephemeral port.
pub async fn mirror(files: &[(&str, &str)]) -> SocketAddr {
    use axum::extract::Path as UrlPath;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::collections::HashMap;
    use std::sync::Arc;

    let files: Arc<HashMap<String, String>> =
        Arc::new(files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
    let app = axum::Router::new().route(
        "/distfiles/{name}",
        axum::routing::get(move |UrlPath(name): UrlPath<String>| {
            let files = Arc::clone(&files);
            async move {
                match files.get(&name) {
                    Some(body) => (StatusCode::OK, body.clone()).into_response(),
                    None => StatusCode::NOT_FOUND.into_response(),
                }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
