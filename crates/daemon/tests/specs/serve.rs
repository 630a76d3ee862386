// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `servedelta serve` specs
//!
//! Run the real server with process workers against a local mirror and a
//! stand-in deltup.

use crate::prelude::*;
use std::time::Duration;

/// Writes its last argument, like deltup writing the delta.
const FAKE_DELTUP: &str = "for last; do :; done\necho delta > \"$last\"";

async fn poll_until_settled(client: &reqwest::Client, url: &str) -> reqwest::Response {
    for _ in 0..500 {
        let response = client.get(url).send().await.unwrap();
        if response.status() != reqwest::StatusCode::ACCEPTED {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job never settled");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_bad_requests_and_shuts_down_cleanly() {
    let root = TempDir::new().unwrap();
    let mut server = Server::start(root.path(), &[]);
    let client = http();

    let response = client.get(server.url("/deltup?have=A&want=B")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 504);
    assert_eq!(response.text().await.unwrap(), "required parameter `url' is not provided");

    let response = client.get(server.url("/index.html")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(response.text().await.unwrap(), "RESOURCE NOT FOUND");

    assert!(root.path().join("servedelta.pid").exists());
    assert!(server.stop().success());
    assert!(!root.path().join("servedelta.pid").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_server_on_same_root_is_refused() {
    let root = TempDir::new().unwrap();
    let _server = Server::start(root.path(), &[]);

    cli_in(root.path())
        .args(&["serve", "--bind", "127.0.0.1:0"])
        .fails()
        .stderr_has("already running");
    assert!(root.path().join("servedelta.pid").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_process_generates_delta() {
    let root = TempDir::new().unwrap();
    let tools = TempDir::new().unwrap();
    let deltup = script(tools.path(), "deltup", FAKE_DELTUP);
    let mirror = mirror(&[("A", "source"), ("B", "destination")]).await;
    let server = Server::start(
        root.path(),
        &[("SERVEDELTA_DELTUP", deltup.to_str().unwrap()), ("SERVEDELTA_FILES_URL", "http://files.test/dtu")],
    );
    let client = http();
    let url = server.url(&format!("/deltup?have=A&want=B&url=http://{mirror}/distfiles/A"));

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 202);
    assert_eq!(first.headers()["content-disposition"], "attachment; filename=deltup-queued");

    let done = poll_until_settled(&client, &url).await;
    assert_eq!(done.status().as_u16(), 301);
    assert_eq!(done.headers()["location"], "http://files.test/dtu/A-B.dtu");

    assert_eq!(std::fs::read_to_string(root.path().join("files/dtu/A-B.dtu")).unwrap().trim(), "delta");
    assert_eq!(std::fs::read_to_string(root.path().join("files/B")).unwrap(), "destination");
    let leftovers: Vec<_> = std::fs::read_dir(root.path().join("files/dtu"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_destination_is_reported() {
    let root = TempDir::new().unwrap();
    let tools = TempDir::new().unwrap();
    let deltup = script(tools.path(), "deltup", FAKE_DELTUP);
    let mirror = mirror(&[("A", "source")]).await;
    let server = Server::start(root.path(), &[("SERVEDELTA_DELTUP", deltup.to_str().unwrap())]);
    let client = http();
    let url = server.url(&format!("/deltup?have=A&want=B&url=http://{mirror}/distfiles/A"));

    client.get(&url).send().await.unwrap();
    let failed = poll_until_settled(&client, &url).await;

    assert_eq!(failed.status().as_u16(), 404);
    assert_eq!(failed.headers()["content-disposition"], "attachment; filename=A-B.failed");
    assert_eq!(failed.text().await.unwrap(), "Destination file could not be fetched");

    let report = client.get(server.url("/A-B.failed")).send().await.unwrap();
    assert_eq!(report.status().as_u16(), 404);
    assert_eq!(report.text().await.unwrap(), "Destination file could not be fetched");
}
