// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workers as tokio tasks inside the serving process.

use crate::pipeline::{Pipeline, PipelineError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sd_adapters::{LaunchError, LaunchedWorker, WorkerExit, WorkerLauncher};
use sd_core::{Clock, WorkerId, WorkerSpec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Runs each job's pipeline as a task. Worker ids are synthetic and only
/// meaningful to this launcher.
pub struct TaskLauncher<C: Clock> {
    pipeline: Arc<Pipeline<C>>,
    next_id: AtomicU32,
    tasks: Arc<Mutex<HashMap<WorkerId, AbortHandle>>>,
}

impl<C: Clock> TaskLauncher<C> {
    pub fn new(pipeline: Arc<Pipeline<C>>) -> Self {
        Self { pipeline, next_id: AtomicU32::new(1), tasks: Arc::new(Mutex::new(HashMap::new())) }
    }
}

#[async_trait]
impl<C: Clock> WorkerLauncher for TaskLauncher<C> {
    async fn launch(&self, spec: &WorkerSpec) -> Result<LaunchedWorker, LaunchError> {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pipeline = Arc::clone(&self.pipeline);
        let task_spec = spec.clone();
        let handle = tokio::spawn(async move {
            match pipeline.run(Some(id), &task_spec).await {
                Ok(_) | Err(PipelineError::Superseded(_)) => {}
                Err(e) => tracing::error!(
                    client = %task_spec.client_key,
                    job_id = %task_spec.job_id,
                    error = %e,
                    "worker task could not record its result"
                ),
            }
        });
        self.tasks.lock().insert(id, handle.abort_handle());

        let (tx, rx) = oneshot::channel();
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            let exit = match handle.await {
                Ok(()) => WorkerExit::Clean,
                Err(e) if e.is_cancelled() => WorkerExit::Abnormal("aborted".to_string()),
                Err(e) => WorkerExit::Abnormal(format!("panicked: {e}")),
            };
            tasks.lock().remove(&id);
            let _ = tx.send(exit);
        });

        tracing::info!(worker_id = %id, client = %spec.client_key, job_id = %spec.job_id, "worker task launched");
        Ok(LaunchedWorker { id, exit: rx })
    }

    fn terminate(&self, id: WorkerId) {
        if let Some(handle) = self.tasks.lock().remove(&id) {
            handle.abort();
            tracing::info!(worker_id = %id, "aborted worker task");
        }
    }

    fn is_alive(&self, id: WorkerId) -> bool {
        self.tasks.lock().contains_key(&id)
    }
}

#[cfg(test)]
#[path = "task_launcher_tests.rs"]
mod tests;
