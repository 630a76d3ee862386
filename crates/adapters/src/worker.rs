// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker launching and signalling.
//!
//! A worker drives one job's pipeline. [`ProcessLauncher`] re-executes a
//! binary as a separate OS process and identifies it by pid.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use sd_core::{WorkerId, WorkerSpec};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::sync::oneshot;

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Clean,
    Abnormal(String),
}

/// Handle to a launched worker.
///
/// `exit` resolves once the worker has ended. A dropped sender means the
/// launcher lost track of the worker.
#[derive(Debug)]
pub struct LaunchedWorker {
    pub id: WorkerId,
    pub exit: oneshot::Receiver<WorkerExit>,
}

/// Errors from launching a worker
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("spawned worker has no pid")]
    NoPid,
}

/// Adapter for starting and stopping job workers
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    /// Start a worker for `spec`. Returns once the worker is running.
    async fn launch(&self, spec: &WorkerSpec) -> Result<LaunchedWorker, LaunchError>;

    /// Stop a worker without waiting for it. Unknown ids are ignored.
    fn terminate(&self, id: WorkerId);

    /// Whether the worker may still be running.
    fn is_alive(&self, id: WorkerId) -> bool;
}

/// Launches workers as child processes:
/// `<program> <base_args…> --client-key K --job-id J --have A --want B --url U`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new<I, S>(program: impl Into<PathBuf>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self { program: program.into(), base_args: base_args.into_iter().map(Into::into).collect() }
    }

    fn command(&self, spec: &WorkerSpec) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg("--client-key")
            .arg(spec.client_key.as_str())
            .arg("--job-id")
            .arg(spec.job_id.as_str())
            .arg("--have")
            .arg(&spec.request.have)
            .arg("--want")
            .arg(&spec.request.want)
            .arg("--url")
            .arg(&spec.request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

fn pid_of(id: WorkerId) -> Option<Pid> {
    i32::try_from(id.0).ok().filter(|pid| *pid > 0).map(Pid::from_raw)
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<LaunchedWorker, LaunchError> {
        let mut child = self.command(spec).spawn()?;
        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            return Err(LaunchError::NoPid);
        };
        let id = WorkerId(pid);
        tracing::info!(
            worker_id = %id,
            client = %spec.client_key,
            job_id = %spec.job_id,
            "worker process launched"
        );

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) if status.success() => WorkerExit::Clean,
                Ok(status) => WorkerExit::Abnormal(status.to_string()),
                Err(e) => WorkerExit::Abnormal(e.to_string()),
            };
            tracing::debug!(worker_id = %id, ?exit, "worker process exited");
            let _ = tx.send(exit);
        });

        Ok(LaunchedWorker { id, exit: rx })
    }

    fn terminate(&self, id: WorkerId) {
        let Some(pid) = pid_of(id) else {
            return;
        };
        match kill(pid, Signal::SIGKILL) {
            Ok(()) => tracing::info!(worker_id = %id, "killed worker"),
            Err(Errno::ESRCH) => tracing::debug!(worker_id = %id, "worker already gone"),
            Err(e) => tracing::warn!(worker_id = %id, error = %e, "failed to kill worker"),
        }
    }

    fn is_alive(&self, id: WorkerId) -> bool {
        let Some(pid) = pid_of(id) else {
            return false;
        };
        // EPERM: the pid exists but belongs to someone else
        matches!(kill(pid, None), Ok(()) | Err(Errno::EPERM))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{LaunchError, LaunchedWorker, WorkerExit, WorkerLauncher};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sd_core::{WorkerId, WorkerSpec};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    struct FakeLaunchState {
        next_id: u32,
        launches: Vec<(WorkerId, WorkerSpec)>,
        terminated: Vec<WorkerId>,
        dead: HashSet<WorkerId>,
        exits: HashMap<WorkerId, oneshot::Sender<WorkerExit>>,
        fail_launch: Option<String>,
    }

    /// Fake launcher for testing.
    ///
    /// Launched workers never run anything; they stay alive until
    /// terminated or ended with [`FakeLauncher::exit`].
    #[derive(Clone)]
    pub struct FakeLauncher {
        inner: Arc<Mutex<FakeLaunchState>>,
    }

    impl Default for FakeLauncher {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeLaunchState {
                    next_id: 100,
                    launches: Vec::new(),
                    terminated: Vec::new(),
                    dead: HashSet::new(),
                    exits: HashMap::new(),
                    fail_launch: None,
                })),
            }
        }
    }

    impl FakeLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every launch fail with this message
        pub fn failing(self, message: &str) -> Self {
            self.inner.lock().fail_launch = Some(message.to_string());
            self
        }

        pub fn launches(&self) -> Vec<(WorkerId, WorkerSpec)> {
            self.inner.lock().launches.clone()
        }

        pub fn terminated(&self) -> Vec<WorkerId> {
            self.inner.lock().terminated.clone()
        }

        /// Mark a worker gone without reporting its exit, as after a
        /// daemon restart.
        pub fn forget(&self, id: WorkerId) {
            let mut state = self.inner.lock();
            state.dead.insert(id);
            state.exits.remove(&id);
        }

        /// End a worker, reporting `exit` to whoever awaits it.
        pub fn exit(&self, id: WorkerId, exit: WorkerExit) {
            let sender = {
                let mut state = self.inner.lock();
                state.dead.insert(id);
                state.exits.remove(&id)
            };
            if let Some(sender) = sender {
                let _ = sender.send(exit);
            }
        }
    }

    #[async_trait]
    impl WorkerLauncher for FakeLauncher {
        async fn launch(&self, spec: &WorkerSpec) -> Result<LaunchedWorker, LaunchError> {
            let mut state = self.inner.lock();
            if let Some(message) = &state.fail_launch {
                return Err(LaunchError::Spawn(std::io::Error::other(message.clone())));
            }
            let id = WorkerId(state.next_id);
            state.next_id += 1;
            state.launches.push((id, spec.clone()));
            let (tx, rx) = oneshot::channel();
            state.exits.insert(id, tx);
            Ok(LaunchedWorker { id, exit: rx })
        }

        fn terminate(&self, id: WorkerId) {
            self.inner.lock().terminated.push(id);
            self.exit(id, WorkerExit::Abnormal("signal: 9 (SIGKILL)".to_string()));
        }

        fn is_alive(&self, id: WorkerId) -> bool {
            let state = self.inner.lock();
            state.launches.iter().any(|(launched, _)| *launched == id) && !state.dead.contains(&id)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLauncher;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
