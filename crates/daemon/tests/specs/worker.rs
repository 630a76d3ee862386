// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `servedelta worker` specs
//!
//! The worker runs one job against a record the server prepared.

use crate::prelude::*;

fn worker_args<'a>(job_id: &'a str, have: &'a str) -> Vec<&'a str> {
    vec![
        "worker",
        "--client-key",
        "10.0.0.1",
        "--job-id",
        job_id,
        "--have",
        have,
        "--want",
        "B",
        "--url",
        // Nothing listens on the discard port
        "http://127.0.0.1:9/distfiles/A",
    ]
}

fn prepare(root: &std::path::Path, job_id: &str, target: &str) -> (RecordStore, ClientKey) {
    let store = RecordStore::open(root.join("proc")).unwrap();
    let key = ClientKey::new("10.0.0.1");
    let record = JobRecord::started(key.clone(), JobId::from_string(job_id), target, &SystemClock);
    store.write(&key, &record).unwrap();
    (store, key)
}

#[test]
fn unreachable_mirror_records_failure() {
    let root = TempDir::new().unwrap();
    let (store, key) = prepare(root.path(), "job-abc", "A-B.dtu");

    cli_in(root.path()).env("SERVEDELTA_FETCH_TIMEOUT_SECS", "5").args(&worker_args("job-abc", "A")).passes();

    let record = store.read_required(&key).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.failure_reason.unwrap().starts_with("unknown <"));
    assert!(record.worker_id.is_some());
    assert!(root.path().join("servedelta.log").exists());
}

#[test]
fn superseded_job_leaves_record_untouched() {
    let root = TempDir::new().unwrap();
    let (store, key) = prepare(root.path(), "job-new", "C-D.dtu");
    let before = store.read_required(&key).unwrap();

    cli_in(root.path()).args(&worker_args("job-old", "A")).passes();

    assert_eq!(store.read_required(&key).unwrap(), before);
}

#[test]
fn path_like_artifact_is_refused() {
    let root = TempDir::new().unwrap();

    cli_in(root.path()).args(&worker_args("job-abc", "../A")).fails().stderr_has("plain file name");
}
