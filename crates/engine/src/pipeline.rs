// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation pipeline run by a worker.
//!
//! Fetches both artifacts, runs the generator, and records every step on
//! the client's job record. Each record mutation first checks that the
//! record still carries this job's id; once another job owns it the
//! pipeline stops without touching it again.

use crate::layout::ArtifactLayout;
use sd_adapters::{ArtifactFetcher, DeltaGenerator, FetchError, GenerateError};
use sd_core::{Clock, JobId, JobRecord, JobStatus, WorkerId, WorkerSpec};
use sd_storage::{RecordStore, StoreError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Why a pipeline run ended without a delta.
///
/// The display text of every variant except `Superseded` is the failure
/// reason stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Source file could not be fetched")]
    SourceUnavailable,

    #[error("Destination file could not be fetched")]
    DestinationUnavailable,

    #[error("deltup: {0}")]
    Generation(String),

    #[error("job {0} no longer owns an active record")]
    Superseded(JobId),

    #[error("unknown <{0}>")]
    Unknown(String),
}

impl PipelineError {
    /// Reason to record, or `None` when the record is no longer ours.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            PipelineError::Superseded(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Unknown(e.to_string())
    }
}

impl From<GenerateError> for PipelineError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::Failed { output, .. } => PipelineError::Generation(output),
            GenerateError::Launch(e) => PipelineError::Generation(e.to_string()),
        }
    }
}

/// Drives one job from STARTED to a terminal status
pub struct Pipeline<C: Clock> {
    store: RecordStore,
    fetcher: Arc<dyn ArtifactFetcher>,
    generator: Arc<dyn DeltaGenerator>,
    layout: ArtifactLayout,
    clock: C,
}

impl<C: Clock> Pipeline<C> {
    pub fn new(
        store: RecordStore,
        fetcher: Arc<dyn ArtifactFetcher>,
        generator: Arc<dyn DeltaGenerator>,
        layout: ArtifactLayout,
        clock: C,
    ) -> Self {
        Self { store, fetcher, generator, layout, clock }
    }

    /// Run the job and record its outcome.
    ///
    /// Returns the terminal status written (FINISHED or FAILED). Errors
    /// only when the job was superseded, or when the failure itself could
    /// not be recorded.
    pub async fn run(
        &self,
        worker_id: Option<WorkerId>,
        spec: &WorkerSpec,
    ) -> Result<JobStatus, PipelineError> {
        tracing::info!(
            client = %spec.client_key,
            job_id = %spec.job_id,
            target = %spec.request.target_name(),
            "pipeline starting"
        );
        match self.execute(worker_id, spec).await {
            Ok(()) => {
                tracing::info!(client = %spec.client_key, job_id = %spec.job_id, "delta finished");
                Ok(JobStatus::Finished)
            }
            Err(PipelineError::Superseded(job_id)) => {
                tracing::info!(client = %spec.client_key, %job_id, "job superseded, stopping");
                Err(PipelineError::Superseded(job_id))
            }
            Err(e) => {
                tracing::warn!(client = %spec.client_key, job_id = %spec.job_id, error = %e, "job failed");
                self.record_failure(spec, e.to_string()).await?;
                Ok(JobStatus::Failed)
            }
        }
    }

    async fn execute(&self, worker_id: Option<WorkerId>, spec: &WorkerSpec) -> Result<(), PipelineError> {
        let request = &spec.request;
        let target_name = request.target_name();

        self.advance(spec, worker_id, JobStatus::FetchingSource).await?;
        let source = self.fetch(&request.have, &request.url).await.map_err(|e| match e {
            FetchError::NotFound(_) => PipelineError::SourceUnavailable,
            other => PipelineError::Unknown(other.to_string()),
        })?;

        self.advance(spec, worker_id, JobStatus::FetchingDestination).await?;
        let destination = self.fetch(&request.want, &request.url).await.map_err(|e| match e {
            FetchError::NotFound(_) => PipelineError::DestinationUnavailable,
            other => PipelineError::Unknown(other.to_string()),
        })?;

        self.advance(spec, worker_id, JobStatus::Generating).await?;
        let partial = self.layout.partial_path(&target_name, &spec.job_id);
        std::fs::create_dir_all(&self.layout.artifacts_dir)
            .map_err(|e| PipelineError::Unknown(e.to_string()))?;
        if let Err(e) = self.generator.generate(&source, &destination, &partial).await {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }
        std::fs::rename(&partial, self.layout.target_path(&target_name))
            .map_err(|e| PipelineError::Unknown(e.to_string()))?;

        self.advance(spec, worker_id, JobStatus::Finished).await
    }

    async fn fetch(&self, name: &str, url: &str) -> Result<PathBuf, FetchError> {
        self.fetcher.fetch(name, url, &self.layout.sources_dir).await
    }

    /// Move the record to `next` if it still belongs to this job.
    async fn advance(
        &self,
        spec: &WorkerSpec,
        worker_id: Option<WorkerId>,
        next: JobStatus,
    ) -> Result<(), PipelineError> {
        let (key, job_id, clock) = (spec.client_key.clone(), spec.job_id.clone(), self.clock.clone());
        let written = self
            .store
            .blocking(move |store| {
                store.update(&key, |current| {
                    let mut record = owned(current, &job_id)?;
                    if record.worker_id.is_none() {
                        record.worker_id = worker_id;
                    }
                    record.advance(next, &clock).ok()?;
                    Some(record)
                })
            })
            .await?;
        match written {
            Some(_) => {
                tracing::debug!(client = %spec.client_key, job_id = %spec.job_id, status = %next, "job advanced");
                Ok(())
            }
            None => Err(PipelineError::Superseded(spec.job_id.clone())),
        }
    }

    async fn record_failure(&self, spec: &WorkerSpec, reason: String) -> Result<(), PipelineError> {
        let (key, job_id, clock) = (spec.client_key.clone(), spec.job_id.clone(), self.clock.clone());
        let written = self
            .store
            .blocking(move |store| {
                store.update(&key, |current| {
                    let mut record = owned(current, &job_id)?;
                    record.fail(reason, &clock).ok()?;
                    Some(record)
                })
            })
            .await?;
        if written.is_none() {
            return Err(PipelineError::Superseded(spec.job_id.clone()));
        }
        Ok(())
    }
}

fn owned(current: Option<JobRecord>, job_id: &JobId) -> Option<JobRecord> {
    current.filter(|record| record.is_owned_by(job_id))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
