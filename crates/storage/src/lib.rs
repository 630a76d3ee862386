// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sd-storage: durable, lock-protected job records keyed by client

mod lock;
mod record_store;

pub use lock::KeyLock;
pub use record_store::{RecordStore, StoreError};
