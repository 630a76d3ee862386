// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: artifact fetching, delta generation and
//! worker processes.

pub mod fetch;
pub mod generate;
pub mod subprocess;
pub mod worker;

pub use fetch::{ArtifactFetcher, FetchError, HttpFetcher};
pub use generate::{DeltaGenerator, DeltupGenerator, GenerateError};
pub use worker::{LaunchError, LaunchedWorker, ProcessLauncher, WorkerExit, WorkerLauncher};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fetch::FakeFetcher;
#[cfg(any(test, feature = "test-support"))]
pub use generate::{FakeGenerator, GenerateCall};
#[cfg(any(test, feature = "test-support"))]
pub use worker::FakeLauncher;
