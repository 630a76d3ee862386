// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{ClientKey, DeltaRequest, JobId, WorkerSpec};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::job::JobStatus;
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Started),
            Just(JobStatus::FetchingSource),
            Just(JobStatus::FetchingDestination),
            Just(JobStatus::Generating),
            Just(JobStatus::Finished),
            Just(JobStatus::Failed),
        ]
    }
}

// ── Factory functions ───────────────────────────────────────────────────

/// Build a request with names that always validate.
pub fn delta_request(have: &str, want: &str) -> DeltaRequest {
    DeltaRequest {
        have: have.to_string(),
        want: want.to_string(),
        url: format!("http://mirror.test/distfiles/{have}"),
    }
}

pub fn worker_spec(client: &str, job_id: &JobId, have: &str, want: &str) -> WorkerSpec {
    WorkerSpec {
        client_key: ClientKey::new(client),
        job_id: job_id.clone(),
        request: delta_request(have, want),
    }
}
