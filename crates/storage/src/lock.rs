// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key exclusive file lock.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive `flock` on a key's lock file, released on drop.
///
/// The lock file is separate from the record and never deleted: record
/// files get replaced by rename and removed on consumption, and a lock
/// taken on an unlinked inode would not exclude anyone.
pub struct KeyLock {
    file: File,
}

impl KeyLock {
    /// Block until the lock at `path` is held.
    pub fn acquire(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // Unlock before the handle closes
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release record lock");
        }
    }
}
