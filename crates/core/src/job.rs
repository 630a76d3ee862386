// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.

use crate::client::ClientKey;
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Identifier of one job lineage.
    ///
    /// Minted by the controller for every new job and handed to the worker.
    /// Acts as an ownership token: a worker only mutates a record carrying
    /// its own job id, so a superseded worker can never overwrite its
    /// successor's record.
    pub struct JobId("job-");
}

/// Identifier of the worker driving a job (OS pid in process mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline status of a job.
///
/// Ordered: STARTED → FETCHING_SOURCE → FETCHING_DESTINATION → GENERATING →
/// {FINISHED | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Started,
    FetchingSource,
    FetchingDestination,
    Generating,
    Finished,
    Failed,
}

impl JobStatus {
    /// Position in the pipeline. Both terminal statuses share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Started => 0,
            JobStatus::FetchingSource => 1,
            JobStatus::FetchingDestination => 2,
            JobStatus::Generating => 3,
            JobStatus::Finished | JobStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps the pipeline monotonic.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

crate::simple_display! {
    JobStatus {
        Started => "STARTED",
        FetchingSource => "FETCHING_SOURCE",
        FetchingDestination => "FETCHING_DESTINATION",
        Generating => "GENERATING",
        Finished => "FINISHED",
        Failed => "FAILED",
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move job {job_id} from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Durable status document for a client's current job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub client_key: ClientKey,
    pub job_id: JobId,
    /// Unset between record creation and worker launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    pub target_name: String,
    pub status: JobStatus,
    /// Present only when `status` is FAILED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

crate::builder! {
    pub struct JobRecordBuilder => JobRecord {
        into {
            client_key: ClientKey = ClientKey::new("127.0.0.1"),
            job_id: JobId = JobId::from_string("job-test"),
            target_name: String = "A-B.dtu",
        }
        set {
            status: JobStatus = JobStatus::Started,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            worker_id: WorkerId = None,
            failure_reason: String = None,
        }
    }
}

impl JobRecord {
    /// Fresh record for a job that has not been handed to a worker yet.
    pub fn started(
        client_key: ClientKey,
        job_id: JobId,
        target_name: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.epoch_ms();
        Self {
            client_key,
            job_id,
            worker_id: None,
            target_name: target_name.into(),
            status: JobStatus::Started,
            failure_reason: None,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether this record belongs to the given job lineage.
    pub fn is_owned_by(&self, job_id: &JobId) -> bool {
        &self.job_id == job_id
    }

    /// Move to a later non-failed status.
    pub fn advance(&mut self, next: JobStatus, clock: &impl Clock) -> Result<(), TransitionError> {
        if next == JobStatus::Failed || !self.status.can_advance_to(next) {
            return Err(self.transition_error(next));
        }
        self.status = next;
        self.updated_at_ms = clock.epoch_ms();
        Ok(())
    }

    /// Move to FAILED from any non-terminal status.
    pub fn fail(&mut self, reason: impl Into<String>, clock: &impl Clock) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(self.transition_error(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at_ms = clock.epoch_ms();
        Ok(())
    }

    fn transition_error(&self, to: JobStatus) -> TransitionError {
        TransitionError { job_id: self.job_id.clone(), from: self.status, to }
    }
}

/// Artifact name without its final extension, used for `.failed` markers.
pub fn target_stem(target_name: &str) -> &str {
    match target_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => target_name,
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
