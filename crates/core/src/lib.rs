// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sd-core: domain types for the servedelta delta server

pub mod macros;

pub mod client;
pub mod clock;
pub mod delta;
pub mod id;
pub mod job;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::ClientKey;
pub use clock::{Clock, FakeClock, SystemClock};
pub use delta::{target_name, DeltaRequest, InvalidRequest, WorkerSpec, DTU_EXTENSION};
pub use job::{JobId, JobRecord, JobStatus, TransitionError, WorkerId};
