// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client identity used to partition jobs.
//!
//! A client is identified by its network address, or by the first hop of
//! `X-Forwarded-For` when the server sits behind a proxy. The key doubles as
//! the record file stem, so it is reduced to a filename-safe alphabet.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Filename-safe client identity. At most one active job exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Build a key from an arbitrary identity string.
    ///
    /// Characters outside `[A-Za-z0-9.:_-]` are replaced by `_`; an empty
    /// identity becomes `unknown`.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self("unknown".to_string());
        }
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-') { c } else { '_' })
            .collect();
        // "." and ".." are valid under the alphabet but not as file stems
        if cleaned.chars().all(|c| c == '.') {
            return Self(cleaned.replace('.', "_"));
        }
        Self(cleaned)
    }

    /// Derive the key for a request: forwarded header first, then peer address.
    pub fn from_request(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Self {
        let forwarded = forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        match (forwarded, peer) {
            (Some(hop), _) => Self::new(hop),
            (None, Some(addr)) => Self::new(&addr.to_string()),
            (None, None) => Self::new(""),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
