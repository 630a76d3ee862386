// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::*;
use crate::FakeClock;
use proptest::prelude::*;

#[test]
fn started_record_has_no_worker_or_reason() {
    let clock = FakeClock::new();
    let record = JobRecord::started(ClientKey::new("10.0.0.1"), JobId::new(), "A-B.dtu", &clock);

    assert_eq!(record.status, JobStatus::Started);
    assert!(record.worker_id.is_none());
    assert!(record.failure_reason.is_none());
    assert_eq!(record.created_at_ms, clock.epoch_ms());
}

#[yare::parameterized(
    started     = { JobStatus::Started,             "STARTED" },
    source      = { JobStatus::FetchingSource,      "FETCHING_SOURCE" },
    destination = { JobStatus::FetchingDestination, "FETCHING_DESTINATION" },
    generating  = { JobStatus::Generating,          "GENERATING" },
    finished    = { JobStatus::Finished,            "FINISHED" },
    failed      = { JobStatus::Failed,              "FAILED" },
)]
fn status_display_matches_wire_name(status: JobStatus, expected: &str) {
    assert_eq!(status.to_string(), expected);
    assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{expected}\""));
}

#[test]
fn advance_walks_the_pipeline() {
    let clock = FakeClock::new();
    let mut record = JobRecord::builder().build();

    for next in [
        JobStatus::FetchingSource,
        JobStatus::FetchingDestination,
        JobStatus::Generating,
        JobStatus::Finished,
    ] {
        clock.advance(std::time::Duration::from_secs(1));
        record.advance(next, &clock).unwrap();
        assert_eq!(record.status, next);
        assert_eq!(record.updated_at_ms, clock.epoch_ms());
    }
}

#[yare::parameterized(
    backwards        = { JobStatus::Generating,     JobStatus::FetchingSource },
    same             = { JobStatus::FetchingSource, JobStatus::FetchingSource },
    from_finished    = { JobStatus::Finished,       JobStatus::Generating },
    failed_via_advance = { JobStatus::Started,      JobStatus::Failed },
)]
fn advance_rejects(from: JobStatus, to: JobStatus) {
    let clock = FakeClock::new();
    let mut record = JobRecord::builder().status(from).build();
    let err = record.advance(to, &clock).unwrap_err();
    assert_eq!(err.from, from);
    assert_eq!(err.to, to);
    assert_eq!(record.status, from);
}

#[test]
fn fail_sets_reason_once() {
    let clock = FakeClock::new();
    let mut record = JobRecord::builder().status(JobStatus::FetchingDestination).build();

    record.fail("Destination file could not be fetched", &clock).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.failure_reason.as_deref(), Some("Destination file could not be fetched"));

    assert!(record.fail("again", &clock).is_err());
    assert_eq!(record.failure_reason.as_deref(), Some("Destination file could not be fetched"));
}

#[test]
fn finished_cannot_fail() {
    let clock = FakeClock::new();
    let mut record = JobRecord::builder().status(JobStatus::Finished).build();
    assert!(record.fail("late", &clock).is_err());
    assert!(record.failure_reason.is_none());
}

#[yare::parameterized(
    dtu      = { "A-B.dtu",           "A-B" },
    dotted   = { "a-1.0-a-1.1.dtu",   "a-1.0-a-1.1" },
    no_ext   = { "plain",             "plain" },
    hidden   = { ".dtu",              ".dtu" },
)]
fn target_stem_strips_extension(name: &str, expected: &str) {
    assert_eq!(target_stem(name), expected);
}

#[test]
fn record_json_round_trip_preserves_text() {
    let record = JobRecord::builder()
        .target_name("naïve-☃.dtu")
        .status(JobStatus::Failed)
        .failure_reason("deltup: ünïcode\nsecond line")
        .worker_id(WorkerId(4242))
        .build();

    let json = serde_json::to_string(&record).unwrap();
    let parsed: JobRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn optional_fields_are_omitted() {
    let record = JobRecord::builder().build();
    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("worker_id").is_none());
    assert!(json.get("failure_reason").is_none());
}

proptest! {
    #[test]
    fn status_never_regresses(steps in proptest::collection::vec(arb_job_status(), 0..20)) {
        let clock = FakeClock::new();
        let mut record = JobRecord::builder().build();
        let mut last_rank = record.status.rank();
        let mut terminal = None;

        for next in steps {
            let before = record.status;
            let result = if next == JobStatus::Failed {
                record.fail("boom", &clock)
            } else {
                record.advance(next, &clock)
            };
            if result.is_err() {
                prop_assert_eq!(record.status, before);
            }
            prop_assert!(record.status.rank() >= last_rank);
            if let Some(done) = terminal {
                prop_assert_eq!(record.status, done);
            }
            if record.is_terminal() {
                terminal = Some(record.status);
            }
            prop_assert_eq!(record.failure_reason.is_some(), record.status == JobStatus::Failed);
            last_rank = record.status.rank();
        }
    }
}
