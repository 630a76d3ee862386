// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client job controller.
//!
//! Decides, for each delta request, whether to serve a finished artifact,
//! report progress, or start (and possibly supersede) a job. It never
//! fetches or generates anything itself; that happens in the worker it
//! launches.

use crate::layout::ArtifactLayout;
use parking_lot::Mutex;
use sd_adapters::{LaunchedWorker, WorkerExit, WorkerLauncher};
use sd_core::{
    ClientKey, Clock, DeltaRequest, InvalidRequest, JobId, JobRecord, JobStatus, WorkerSpec,
};
use sd_storage::{RecordStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Answer to a client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The artifact is ready under the files URL.
    Redirect(String),
    /// A job is in flight with this status.
    Queued(JobStatus),
    Failed { target_name: String, reason: String },
    /// The request was rejected before reaching the job machinery.
    Invalid(String),
}

impl From<InvalidRequest> for Outcome {
    fn from(e: InvalidRequest) -> Self {
        Outcome::Invalid(e.to_string())
    }
}

/// Errors from the controller. All of them are server faults.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// In-process mutex per client, serialising request decisions.
#[derive(Default)]
struct ClientLocks {
    locks: Mutex<HashMap<ClientKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClientLocks {
    fn get(&self, key: &ClientKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        // Entries only the map holds are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

pub struct JobController<C: Clock> {
    store: RecordStore,
    launcher: Arc<dyn WorkerLauncher>,
    layout: ArtifactLayout,
    clock: C,
    client_locks: ClientLocks,
}

impl<C: Clock> JobController<C> {
    pub fn new(
        store: RecordStore,
        launcher: Arc<dyn WorkerLauncher>,
        layout: ArtifactLayout,
        clock: C,
    ) -> Self {
        Self { store, launcher, layout, clock, client_locks: ClientLocks::default() }
    }

    /// Handle `/deltup?have=…&want=…&url=…` for a client.
    pub async fn handle_delta_request(
        &self,
        client: &ClientKey,
        request: &DeltaRequest,
    ) -> Result<Outcome, ControllerError> {
        let target_name = request.target_name();
        if self.layout.has_target(&target_name) {
            tracing::debug!(%client, target = %target_name, "artifact already published");
            return Ok(Outcome::Redirect(target_name));
        }

        let lock = self.client_locks.get(client);
        let _guard = lock.lock().await;

        let key = client.clone();
        if let Some(record) = self.store.blocking(move |store| store.read(&key)).await? {
            if record.target_name == target_name {
                return self.progress(client, record).await;
            }
            self.supersede(&record);
        }
        self.start_job(client, request).await
    }

    /// Handle `<stem>.failed`: the reason recorded for the client's job.
    pub async fn failure_report(&self, client: &ClientKey) -> Result<Outcome, ControllerError> {
        let key = client.clone();
        let record = self.store.blocking(move |store| store.read_required(&key)).await?;
        Ok(Outcome::Failed {
            target_name: record.target_name,
            reason: record.failure_reason.unwrap_or_default(),
        })
    }

    /// Report on an existing job for the requested target. Never launches.
    async fn progress(&self, client: &ClientKey, record: JobRecord) -> Result<Outcome, ControllerError> {
        let alive = record.worker_id.is_some_and(|id| self.launcher.is_alive(id));
        if record.is_terminal() || alive {
            return self.report(client, record).await;
        }

        let reason = match record.worker_id {
            Some(id) => format!("unknown <worker {id} is no longer running>"),
            None => "unknown <no worker was attached to the job>".to_string(),
        };
        tracing::warn!(%client, job_id = %record.job_id, %reason, "job lost its worker");
        match fail_if_active(&self.store, client, &record.job_id, reason, &self.clock).await? {
            Some(failed) => self.report(client, failed).await,
            // The worker recorded a result just before it went away
            None => {
                let key = client.clone();
                let current = self.store.blocking(move |store| store.read_required(&key)).await?;
                self.report(client, current).await
            }
        }
    }

    async fn report(&self, client: &ClientKey, record: JobRecord) -> Result<Outcome, ControllerError> {
        match record.status {
            JobStatus::Failed => Ok(Outcome::Failed {
                target_name: record.target_name,
                reason: record.failure_reason.unwrap_or_default(),
            }),
            JobStatus::Finished => {
                let key = client.clone();
                self.store.blocking(move |store| store.remove(&key)).await?;
                tracing::info!(%client, target = %record.target_name, "finished job consumed");
                Ok(Outcome::Redirect(record.target_name))
            }
            status => Ok(Outcome::Queued(status)),
        }
    }

    fn supersede(&self, record: &JobRecord) {
        tracing::info!(
            client = %record.client_key,
            job_id = %record.job_id,
            target = %record.target_name,
            "superseding job"
        );
        if record.is_terminal() {
            return;
        }
        if let Some(id) = record.worker_id {
            self.launcher.terminate(id);
        }
    }

    async fn start_job(&self, client: &ClientKey, request: &DeltaRequest) -> Result<Outcome, ControllerError> {
        let target_name = request.target_name();
        let job_id = JobId::new();
        let record = JobRecord::started(client.clone(), job_id.clone(), &target_name, &self.clock);
        let key = client.clone();
        self.store.blocking(move |store| store.write(&key, &record)).await?;

        let spec = WorkerSpec { client_key: client.clone(), job_id, request: request.clone() };
        let worker = match self.launcher.launch(&spec).await {
            Ok(worker) => worker,
            Err(e) => {
                let reason = format!("unknown <{e}>");
                tracing::error!(%client, job_id = %spec.job_id, error = %e, "worker launch failed");
                fail_if_active(&self.store, client, &spec.job_id, reason.clone(), &self.clock).await?;
                return Ok(Outcome::Failed { target_name, reason });
            }
        };

        let worker_id = worker.id;
        let (key, owner) = (client.clone(), spec.job_id.clone());
        self.store
            .blocking(move |store| {
                store.update(&key, |current| {
                    let mut record = current.filter(|r| r.is_owned_by(&owner))?;
                    if record.worker_id.is_some() {
                        return None;
                    }
                    record.worker_id = Some(worker_id);
                    Some(record)
                })
            })
            .await?;
        tracing::info!(%client, job_id = %spec.job_id, %worker_id, target = %target_name, "job started");

        self.watch(spec, worker);
        Ok(Outcome::Queued(JobStatus::Started))
    }

    /// Fail the job if its worker ends without recording a result.
    fn watch(&self, spec: WorkerSpec, worker: LaunchedWorker) {
        let store = self.store.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            let detail = match worker.exit.await {
                Ok(WorkerExit::Clean) => "exited cleanly".to_string(),
                Ok(WorkerExit::Abnormal(detail)) => detail,
                Err(_) => return,
            };
            let reason = format!("unknown <worker exited before recording a result: {detail}>");
            match fail_if_active(&store, &spec.client_key, &spec.job_id, reason, &clock).await {
                Ok(Some(_)) => tracing::warn!(
                    client = %spec.client_key,
                    job_id = %spec.job_id,
                    worker_id = %worker.id,
                    %detail,
                    "worker exited without a result"
                ),
                Ok(None) => {}
                Err(e) => tracing::error!(
                    client = %spec.client_key,
                    job_id = %spec.job_id,
                    error = %e,
                    "failed to record worker exit"
                ),
            }
        });
    }
}

/// Mark the job FAILED if the record is still its own and not terminal.
async fn fail_if_active<C: Clock>(
    store: &RecordStore,
    client: &ClientKey,
    job_id: &JobId,
    reason: String,
    clock: &C,
) -> Result<Option<JobRecord>, StoreError> {
    let (key, job_id, clock) = (client.clone(), job_id.clone(), clock.clone());
    store
        .blocking(move |store| {
            store.update(&key, |current| {
                let mut record = current.filter(|r| r.is_owned_by(&job_id))?;
                record.fail(reason, &clock).ok()?;
                Some(record)
            })
        })
        .await
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
