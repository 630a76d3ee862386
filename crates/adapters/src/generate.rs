// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delta generation via the external `deltup` tool.

use crate::subprocess::{combined_output, run_with_timeout, SubprocessError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from delta generation
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The tool ran and exited unsuccessfully.
    #[error("exited with {}: {output}", exit_label(.code))]
    Failed { code: Option<i32>, output: String },

    /// The tool could not be started or did not finish in time.
    #[error(transparent)]
    Launch(#[from] SubprocessError),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Adapter producing a delta file from two local artifacts
#[async_trait]
pub trait DeltaGenerator: Send + Sync + 'static {
    /// Write the delta transforming `source` into `destination` to `output`.
    async fn generate(
        &self,
        source: &Path,
        destination: &Path,
        output: &Path,
    ) -> Result<(), GenerateError>;
}

/// Runs `deltup -d <write_dir> -D <read_dir> -m -g <level> <source> <destination> <output>`.
#[derive(Debug, Clone)]
pub struct DeltupGenerator {
    program: PathBuf,
    read_dir: PathBuf,
    write_dir: PathBuf,
    level: u8,
    timeout: Duration,
}

impl DeltupGenerator {
    pub fn new(program: impl Into<PathBuf>, read_dir: impl Into<PathBuf>, write_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            read_dir: read_dir.into(),
            write_dir: write_dir.into(),
            level: 9,
            timeout: crate::subprocess::GENERATE_TIMEOUT,
        }
    }

    /// Compression level passed as `-g`
    pub fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, source: &Path, destination: &Path, output: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("-d")
            .arg(&self.write_dir)
            .arg("-D")
            .arg(&self.read_dir)
            .arg("-m")
            .arg("-g")
            .arg(self.level.to_string())
            .arg(source)
            .arg(destination)
            .arg(output)
            .stdin(std::process::Stdio::null());
        cmd
    }
}

#[async_trait]
impl DeltaGenerator for DeltupGenerator {
    async fn generate(
        &self,
        source: &Path,
        destination: &Path,
        output: &Path,
    ) -> Result<(), GenerateError> {
        tracing::info!(
            program = %self.program.display(),
            source = %source.display(),
            destination = %destination.display(),
            output = %output.display(),
            "generating delta"
        );
        let cmd = self.command(source, destination, output);
        let result = run_with_timeout(cmd, self.timeout, "deltup").await?;

        if result.status.success() {
            return Ok(());
        }
        let output = combined_output(&result);
        tracing::warn!(code = ?result.status.code(), %output, "deltup failed");
        Err(GenerateError::Failed { code: result.status.code(), output })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{DeltaGenerator, GenerateError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tokio::sync::watch;

    /// Recorded generate call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct GenerateCall {
        pub source: PathBuf,
        pub destination: PathBuf,
        pub output: PathBuf,
    }

    #[derive(Default)]
    struct FakeGenerateState {
        failure: Option<String>,
        calls: Vec<GenerateCall>,
    }

    /// Fake generator for testing. Writes a small delta unless told to fail.
    #[derive(Clone)]
    pub struct FakeGenerator {
        inner: Arc<Mutex<FakeGenerateState>>,
        gate: Arc<watch::Sender<bool>>,
    }

    impl Default for FakeGenerator {
        fn default() -> Self {
            let (gate, _) = watch::channel(true);
            Self { inner: Arc::new(Mutex::new(FakeGenerateState::default())), gate: Arc::new(gate) }
        }
    }

    impl FakeGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Exit unsuccessfully with this diagnostic output
        pub fn failing(self, output: &str) -> Self {
            self.inner.lock().failure = Some(output.to_string());
            self
        }

        pub fn close_gate(&self) {
            self.gate.send_replace(false);
        }

        pub fn open_gate(&self) {
            self.gate.send_replace(true);
        }

        pub fn calls(&self) -> Vec<GenerateCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl DeltaGenerator for FakeGenerator {
        async fn generate(
            &self,
            source: &Path,
            destination: &Path,
            output: &Path,
        ) -> Result<(), GenerateError> {
            self.inner.lock().calls.push(GenerateCall {
                source: source.to_path_buf(),
                destination: destination.to_path_buf(),
                output: output.to_path_buf(),
            });

            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;

            let failure = self.inner.lock().failure.clone();
            if let Some(output) = failure {
                return Err(GenerateError::Failed { code: Some(1), output });
            }
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GenerateError::Failed { code: None, output: e.to_string() })?;
            }
            std::fs::write(output, b"fake delta")
                .map_err(|e| GenerateError::Failed { code: None, output: e.to_string() })?;
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGenerator, GenerateCall};

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;
