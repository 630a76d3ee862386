// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record persistence.
//!
//! One JSON document per client at `<dir>/<client_key>.json`, guarded by
//! an exclusive lock on `<dir>/<client_key>.lock`. The lock is held for a
//! single operation (a read, a write, or one read-modify-write), never
//! across a pipeline step, so pollers only wait on brief record updates.
//! Writes go to a temp file that is renamed over the record, so a crash
//! mid-write leaves the previous record intact.

use crate::lock::KeyLock;
use sd_core::{ClientKey, JobRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no job record for client {0}")]
    RecordUnavailable(ClientKey),

    #[error("job record for client {client} is corrupt: {source}")]
    Corrupt {
        client: ClientKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory of per-client job records. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: Arc<PathBuf>,
}

impl RecordStore {
    /// Open (and create if needed) the record directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir: Arc::new(dir) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: &ClientKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &ClientKey) -> PathBuf {
        self.dir.join(format!("{key}.lock"))
    }

    fn lock(&self, key: &ClientKey) -> Result<KeyLock, StoreError> {
        Ok(KeyLock::acquire(&self.lock_path(key))?)
    }

    /// Read the client's record; `None` when there is none.
    pub fn read(&self, key: &ClientKey) -> Result<Option<JobRecord>, StoreError> {
        let _guard = self.lock(key)?;
        self.load(key)
    }

    /// Read the client's record, treating absence as an error.
    pub fn read_required(&self, key: &ClientKey) -> Result<JobRecord, StoreError> {
        self.read(key)?.ok_or_else(|| StoreError::RecordUnavailable(key.clone()))
    }

    /// Replace the client's record.
    pub fn write(&self, key: &ClientKey, record: &JobRecord) -> Result<(), StoreError> {
        let _guard = self.lock(key)?;
        self.save(key, record)
    }

    /// Atomic read-modify-write.
    ///
    /// `f` sees the current record and returns the replacement, or `None`
    /// to leave the record as it is. Returns what was written.
    pub fn update<F>(&self, key: &ClientKey, f: F) -> Result<Option<JobRecord>, StoreError>
    where
        F: FnOnce(Option<JobRecord>) -> Option<JobRecord>,
    {
        let _guard = self.lock(key)?;
        let current = self.load(key)?;
        match f(current) {
            Some(next) => {
                self.save(key, &next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    /// Delete the client's record. Returns whether one existed.
    pub fn remove(&self, key: &ClientKey) -> Result<bool, StoreError> {
        let _guard = self.lock(key)?;
        match std::fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `f` against the store on tokio's blocking pool.
    ///
    /// Every operation may wait on another process's record lock, so async
    /// callers go through here rather than blocking a runtime worker.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&RecordStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    fn load(&self, key: &ClientKey) -> Result<Option<JobRecord>, StoreError> {
        let bytes = match std::fs::read(self.record_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { client: key.clone(), source })
    }

    fn save(&self, key: &ClientKey, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.record_path(key);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        tracing::debug!(client = %key, job_id = %record.job_id, status = %record.status, "saved job record");
        Ok(())
    }
}

#[cfg(test)]
#[path = "record_store_tests.rs"]
mod tests;
