// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! servedelta - delta generation server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sd_daemon::{env, logging, worker, Config, ListenCtx, StartupResult, WorkerArgs};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "servedelta", version = env::VERSION, about = "Serve binary deltas between distfiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve delta requests over HTTP
    Serve {
        /// Listen address (overrides SERVEDELTA_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run one generation job (launched by the server)
    Worker(WorkerCommand),
}

#[derive(Args)]
struct WorkerCommand {
    /// Record key of the requesting client
    #[arg(long)]
    client_key: String,
    /// Job the client's record must still belong to
    #[arg(long)]
    job_id: String,
    /// Artifact the client has
    #[arg(long)]
    have: String,
    /// Artifact the client wants
    #[arg(long)]
    want: String,
    /// URL of a file in the directory both artifacts are fetched from
    #[arg(long)]
    url: String,
}

impl From<WorkerCommand> for WorkerArgs {
    fn from(cmd: WorkerCommand) -> Self {
        WorkerArgs {
            client_key: cmd.client_key,
            job_id: cmd.job_id,
            have: cmd.have,
            want: cmd.want,
            url: cmd.url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    let _log_guard = logging::init(&config.log_path)?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(config).await
        }
        Command::Worker(cmd) => work(config, cmd.into()).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(version = env::VERSION, "starting servedelta");
    let StartupResult { mut daemon, listener, controller } = sd_daemon::startup(&config).await?;
    let ctx = Arc::new(ListenCtx { controller, files_url: config.files_url.clone() });

    let served = sd_daemon::serve(listener, ctx, shutdown_signal()).await;
    daemon.shutdown()?;
    served.context("HTTP server failed")
}

async fn work(config: Config, args: WorkerArgs) -> Result<()> {
    let client_key = args.client_key.clone();
    let job_id = args.job_id.clone();
    match worker::run(&config, args).await {
        Ok(Some(status)) => info!(%client_key, %job_id, %status, "worker done"),
        Ok(None) => info!(%client_key, %job_id, "worker superseded"),
        Err(e) => {
            error!(%client_key, %job_id, error = %e, "worker failed");
            return Err(e.into());
        }
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    info!("shutdown signal received");
}
