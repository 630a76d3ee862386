// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::tempdir;

/// Serve `files` under `/distfiles/`; `boom` answers 500, anything else 404.
async fn mirror(files: &[(&str, &str)]) -> SocketAddr {
    slow_mirror(files, Duration::ZERO).await
}

/// Like [`mirror`], answering each request after `delay`.
async fn slow_mirror(files: &[(&str, &str)], delay: Duration) -> SocketAddr {
    let files: Arc<HashMap<String, String>> =
        Arc::new(files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
    let app = Router::new().route(
        "/distfiles/{name}",
        get(move |UrlPath(name): UrlPath<String>| {
            let files = Arc::clone(&files);
            async move {
                tokio::time::sleep(delay).await;
                let response: Response = match files.get(&name) {
                    Some(body) => (StatusCode::OK, body.clone()).into_response(),
                    None if name == "boom" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                    None => StatusCode::NOT_FOUND.into_response(),
                };
                response
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5)).unwrap()
}

fn leftover_parts(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect()
}

#[yare::parameterized(
    sibling      = { "http://m/distfiles/a.tar.bz2", "b.tar.bz2", "http://m/distfiles/b.tar.bz2" },
    trailing     = { "http://m/distfiles/",          "b",         "http://m/distfiles/b" },
    no_slash     = { "mirror",                       "b",         "mirror/b" },
)]
fn sibling_url_replaces_last_segment(url: &str, name: &str, expected: &str) {
    assert_eq!(sibling_url(url, name), expected);
}

#[tokio::test]
async fn downloads_missing_artifact() {
    let addr = mirror(&[("b.tar.bz2", "destination bytes")]).await;
    let dir = tempdir().unwrap();
    let url = format!("http://{addr}/distfiles/a.tar.bz2");

    let path = fetcher().fetch("b.tar.bz2", &url, dir.path()).await.unwrap();

    assert_eq!(path, dir.path().join("b.tar.bz2"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "destination bytes");
    assert!(leftover_parts(dir.path()).is_empty());
}

#[tokio::test]
async fn existing_artifact_skips_download() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.tar.bz2"), "cached").unwrap();

    // Nothing listens on the discard port; a request would fail
    let path = fetcher().fetch("a.tar.bz2", "http://127.0.0.1:9/x/a.tar.bz2", dir.path()).await.unwrap();

    assert_eq!(std::fs::read_to_string(path).unwrap(), "cached");
}

#[tokio::test]
async fn missing_on_mirror_is_not_found() {
    let addr = mirror(&[]).await;
    let dir = tempdir().unwrap();
    let url = format!("http://{addr}/distfiles/a.tar.bz2");

    let err = fetcher().fetch("nope.tar.bz2", &url, dir.path()).await.unwrap_err();

    assert!(matches!(err, FetchError::NotFound(ref u) if u.ends_with("/distfiles/nope.tar.bz2")));
    assert!(!dir.path().join("nope.tar.bz2").exists());
    assert!(leftover_parts(dir.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_downloads_of_one_artifact_both_succeed() {
    let addr = slow_mirror(&[("pkg.tar", "ok")], Duration::from_millis(300)).await;
    let dir = tempdir().unwrap();
    let url = format!("http://{addr}/distfiles/other.tar");

    let first = {
        let (url, dest) = (url.clone(), dir.path().to_path_buf());
        tokio::spawn(async move { fetcher().fetch("pkg.tar", &url, &dest).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = fetcher().fetch("pkg.tar", &url, dir.path()).await;
    let first = first.await.unwrap();

    for result in [first, second] {
        let path = result.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "ok");
    }
    assert!(leftover_parts(dir.path()).is_empty());
}

#[tokio::test]
async fn server_error_is_distinct_from_not_found() {
    let addr = mirror(&[]).await;
    let dir = tempdir().unwrap();
    let url = format!("http://{addr}/distfiles/a.tar.bz2");

    let err = fetcher().fetch("boom", &url, dir.path()).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 500, .. }));
}

#[tokio::test]
async fn fake_fetcher_honours_missing_and_gate() {
    let dir = tempdir().unwrap();
    let fake = FakeFetcher::new().missing("gone");

    let err = fake.fetch("gone", "http://x/a", dir.path()).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));

    fake.close_gate();
    let held = {
        let fake = fake.clone();
        let dest = dir.path().to_path_buf();
        tokio::spawn(async move { fake.fetch("here", "http://x/a", &dest).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!held.is_finished());

    fake.open_gate();
    let path = held.await.unwrap().unwrap();
    assert!(path.exists());
    assert_eq!(fake.calls(), vec!["gone".to_string(), "here".to_string()]);
}
