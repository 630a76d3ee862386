// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP listener.
//!
//! Every request goes through one fallback handler that classifies the
//! path and hands it to the job controller. Finished deltas are served
//! by a separate static server under the files URL.

mod dispatch;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use sd_core::Clock;
use sd_engine::JobController;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared context for all request handlers.
pub struct ListenCtx<C: Clock> {
    pub controller: Arc<JobController<C>>,
    /// Redirect base for finished deltas, without trailing slash
    pub files_url: String,
}

pub fn router<C: Clock>(ctx: Arc<ListenCtx<C>>) -> Router {
    Router::new()
        .fallback(handle::<C>)
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
}

async fn handle<C: Clock>(State(ctx): State<Arc<ListenCtx<C>>>, request: Request) -> Response {
    dispatch::dispatch(&ctx, request).await
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<C: Clock>(
    listener: TcpListener,
    ctx: Arc<ListenCtx<C>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    let app = router(ctx).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}
