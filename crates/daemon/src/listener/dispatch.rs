// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request classification and response mapping.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, Request};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use sd_core::job::target_stem;
use sd_core::{ClientKey, Clock, DeltaRequest};
use sd_engine::Outcome;

use super::ListenCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// `…/<stem>.failed`
    FailureReport,
    /// `/deltup?have=…&want=…&url=…`
    Delta,
    NotFound,
}

pub(crate) fn classify(path: &str) -> Route {
    if path.ends_with(".failed") {
        Route::FailureReport
    } else if path == "/deltup" {
        Route::Delta
    } else {
        Route::NotFound
    }
}

/// Identity of the requester: first `X-Forwarded-For` hop, else the peer.
pub(crate) fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
    let forwarded = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    ClientKey::from_request(forwarded, peer.map(|addr| addr.ip()))
}

pub(crate) async fn dispatch<C: Clock>(ctx: &ListenCtx<C>, request: Request) -> Response {
    let route = classify(request.uri().path());
    if route == Route::NotFound {
        return not_found();
    }

    let head = request.method() == Method::HEAD;
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let client = client_key(request.headers(), peer);

    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| first_values(pairs));
    drop(request);

    let result = match (route, query) {
        (Route::FailureReport, _) => ctx.controller.failure_report(&client).await,
        (_, Ok(params)) => match DeltaRequest::from_query(&params) {
            Ok(delta) => ctx.controller.handle_delta_request(&client, &delta).await,
            Err(e) => Ok(Outcome::from(e)),
        },
        (_, Err(e)) => Ok(Outcome::Invalid(e.body_text())),
    };

    match result {
        Ok(outcome) => respond(&ctx.files_url, outcome, head),
        Err(e) => {
            tracing::error!(%client, error = %e, "request failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
        }
    }
}

/// First non-blank value of each query key; blank values are dropped.
pub(crate) fn first_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in pairs {
        if !value.is_empty() {
            params.entry(key).or_insert(value);
        }
    }
    params
}

pub(crate) fn respond(files_url: &str, outcome: Outcome, head: bool) -> Response {
    let body = |content: String| if head { Body::empty() } else { Body::from(content) };
    let (status, extra, body) = match outcome {
        Outcome::Redirect(target_name) => {
            (StatusCode::MOVED_PERMANENTLY, (header::LOCATION, format!("{files_url}/{target_name}")), Body::empty())
        }
        Outcome::Queued(job_status) => (
            StatusCode::ACCEPTED,
            (header::CONTENT_DISPOSITION, "attachment; filename=deltup-queued".to_string()),
            body(job_status.to_string()),
        ),
        Outcome::Failed { target_name, reason } => (
            StatusCode::NOT_FOUND,
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}.failed", target_stem(&target_name)),
            ),
            body(reason),
        ),
        Outcome::Invalid(message) => return text(StatusCode::GATEWAY_TIMEOUT, message),
    };
    build(status, Some(extra), body)
}

fn text(status: StatusCode, message: String) -> Response {
    build(status, Some((header::CONTENT_TYPE, "text/plain".to_string())), Body::from(message))
}

fn not_found() -> Response {
    build(StatusCode::NOT_FOUND, None, Body::from("RESOURCE NOT FOUND"))
}

fn build(status: StatusCode, header: Option<(header::HeaderName, String)>, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some((name, value)) = header {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().insert(name, value);
            }
            Err(e) => tracing::warn!(header = %name, error = %e, "dropping unencodable header"),
        }
    }
    response
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
