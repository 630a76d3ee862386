// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry point of a `servedelta worker` process.

use sd_core::{ClientKey, DeltaRequest, InvalidRequest, JobId, JobStatus, WorkerId, WorkerSpec};
use sd_engine::PipelineError;
use thiserror::Error;

use crate::lifecycle::{Config, LifecycleError};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid job arguments: {0}")]
    Invalid(#[from] InvalidRequest),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Pipeline(PipelineError),
}

/// Job parameters passed on the worker command line.
#[derive(Debug, Clone)]
pub struct WorkerArgs {
    pub client_key: String,
    pub job_id: String,
    pub have: String,
    pub want: String,
    pub url: String,
}

impl WorkerArgs {
    pub fn into_spec(self) -> Result<WorkerSpec, InvalidRequest> {
        Ok(WorkerSpec {
            client_key: ClientKey::new(&self.client_key),
            job_id: JobId::from_string(self.job_id),
            request: DeltaRequest::new(self.have, self.want, self.url)?,
        })
    }
}

/// Run one job to a terminal status under this process's pid.
///
/// `Ok(None)` when another job took over the client's record.
pub async fn run(config: &Config, args: WorkerArgs) -> Result<Option<JobStatus>, WorkerError> {
    let spec = args.into_spec()?;
    let pipeline = config.pipeline()?;
    match pipeline.run(Some(WorkerId(std::process::id())), &spec).await {
        Ok(status) => Ok(Some(status)),
        Err(PipelineError::Superseded(_)) => Ok(None),
        Err(e) => Err(WorkerError::Pipeline(e)),
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
