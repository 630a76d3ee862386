// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! servedelta daemon library
//!
//! The HTTP front end, configuration and process lifecycle shared by the
//! `servedelta` binary's `serve` and `worker` commands.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod worker;

pub use lifecycle::{startup, Config, DaemonState, LifecycleError, StartupResult, WorkerMode};
pub use listener::{router, serve, ListenCtx};
pub use worker::{WorkerArgs, WorkerError};
