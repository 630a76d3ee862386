// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sd-engine: job control and the generation pipeline

mod controller;
mod layout;
mod pipeline;
mod task_launcher;

pub use controller::{ControllerError, JobController, Outcome};
pub use layout::ArtifactLayout;
pub use pipeline::{Pipeline, PipelineError};
pub use task_launcher::TaskLauncher;
