// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI help output specs

use crate::prelude::*;

#[test]
fn no_args_shows_usage_and_fails() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn help_lists_commands() {
    cli().args(&["--help"]).passes().stdout_has("serve").stdout_has("worker");
}

#[test]
fn serve_help_shows_bind() {
    cli().args(&["serve", "--help"]).passes().stdout_has("--bind");
}

#[test]
fn worker_help_shows_job_arguments() {
    cli()
        .args(&["worker", "--help"])
        .passes()
        .stdout_has("--client-key")
        .stdout_has("--job-id")
        .stdout_has("--have")
        .stdout_has("--want")
        .stdout_has("--url");
}

#[test]
fn version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.2");
}

#[test]
fn invalid_worker_mode_is_rejected() {
    let root = TempDir::new().unwrap();
    cli_in(root.path())
        .env("SERVEDELTA_WORKER_MODE", "thread")
        .args(&["serve", "--bind", "127.0.0.1:0"])
        .fails()
        .stderr_has("SERVEDELTA_WORKER_MODE");
}
