// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk locations of source artifacts and generated deltas.

use sd_core::JobId;
use std::path::PathBuf;

/// Directories the pipeline reads from and writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Fetched source artifacts land here.
    pub sources_dir: PathBuf,
    /// Finished deltas, served statically under the files URL.
    pub artifacts_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(sources_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self { sources_dir: sources_dir.into(), artifacts_dir: artifacts_dir.into() }
    }

    /// Final location of a delta. Only complete files ever appear here.
    pub fn target_path(&self, target_name: &str) -> PathBuf {
        self.artifacts_dir.join(target_name)
    }

    /// Scratch location the generator writes to before the rename.
    ///
    /// Per job, since clients may generate the same target at once.
    pub fn partial_path(&self, target_name: &str, job_id: &JobId) -> PathBuf {
        self.artifacts_dir.join(format!("{target_name}.{job_id}.partial"))
    }

    pub fn has_target(&self, target_name: &str) -> bool {
        self.target_path(target_name).is_file()
    }
}
