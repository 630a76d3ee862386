// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess helpers with timeouts.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for the delta tool
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label} could not be started: {source}")]
    Spawn {
        label: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} timed out after {}s", .timeout.as_secs())]
    Timeout { label: &'static str, timeout: Duration },
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child is killed if the timeout elapses.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &'static str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { label, source }),
        Err(_) => {
            tracing::warn!(label, timeout_secs = timeout.as_secs(), "subprocess timed out");
            Err(SubprocessError::Timeout { label, timeout })
        }
    }
}

/// Join non-empty stdout and stderr for diagnostics.
pub fn combined_output(output: &Output) -> String {
    [&output.stdout, &output.stderr]
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
