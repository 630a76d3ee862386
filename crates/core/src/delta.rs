// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delta requests: the (have, want, url) triple and its validation.

use crate::client::ClientKey;
use crate::job::JobId;
use std::collections::HashMap;
use thiserror::Error;

/// Extension of generated delta artifacts.
pub const DTU_EXTENSION: &str = "dtu";

/// Canonical artifact name for a (have, want) pair.
pub fn target_name(have: &str, want: &str) -> String {
    format!("{have}-{want}.{DTU_EXTENSION}")
}

/// Rejected request parameters. Never enters the job machinery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("required parameter `{0}' is not provided")]
    MissingParameter(&'static str),

    #[error("parameter `{param}' is not a plain file name: {value:?}")]
    BadArtifactName { param: &'static str, value: String },
}

/// A validated request to produce the delta from `have` to `want`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRequest {
    pub have: String,
    pub want: String,
    /// URL of any file in the source directory; siblings are fetched by name.
    pub url: String,
}

impl DeltaRequest {
    pub fn new(
        have: impl Into<String>,
        want: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, InvalidRequest> {
        let request = Self { have: have.into(), want: want.into(), url: url.into() };
        check_artifact_name("have", &request.have)?;
        check_artifact_name("want", &request.want)?;
        Ok(request)
    }

    /// Extract the request from decoded query parameters.
    ///
    /// `have`, `want` and `url` are required and checked in that order; a
    /// blank value counts as missing. `version` and `time` are accepted and
    /// ignored.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, InvalidRequest> {
        let get = |name: &'static str| {
            params
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or(InvalidRequest::MissingParameter(name))
        };
        let have = get("have")?;
        let want = get("want")?;
        let url = get("url")?;
        Self::new(have, want, url)
    }

    pub fn target_name(&self) -> String {
        target_name(&self.have, &self.want)
    }
}

/// Artifact names become path components locally and URL segments remotely.
fn check_artifact_name(param: &'static str, value: &str) -> Result<(), InvalidRequest> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if bad {
        return Err(InvalidRequest::BadArtifactName { param, value: value.to_string() });
    }
    Ok(())
}

/// Everything a worker needs to run one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub client_key: ClientKey,
    pub job_id: JobId,
    pub request: DeltaRequest,
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod tests;
