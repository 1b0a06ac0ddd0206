//! # Rampart Server
//!
//! HTTP control plane for asynchronous security assessments.
//!
//! ## Overview
//!
//! Rampart Server accepts assessment jobs over HTTP and processes them with
//! an embedded worker pool:
//!
//! - **Job Submission**: `POST /api/v1/jobs` records a job durably and
//!   enqueues it for asynchronous processing
//! - **Job Inspection**: per-job status and recent-job listings, with the
//!   scored assessment report attached once a job completes
//! - **Consumer Control**: pause and resume job consumption at runtime
//!   without dropping queued work
//! - **Risk Scoring**: findings are scored and mapped to categories and
//!   treatment recommendations before the job goes terminal
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - SQLite for the durable job ledger
//! - Redis (optional) for queueing across restarts; an in-process queue
//!   otherwise

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rampart_server::{
    create_app,
    infra::{
        config::{ConfigLoad, ServerConfig},
        startup::{ResourceBootstrap, wire_pipeline},
    },
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "rampart-server")]
#[command(about = "Security assessment pipeline with an HTTP control plane")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// SQLite connection string for the job store (overrides config)
    #[arg(long)]
    database_url: Option<String>,

    /// Redis connection string; enables the Redis queue backend
    #[arg(long)]
    redis_url: Option<String>,

    /// Worker count for the embedded consumer pool (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Boot with the consumer paused; jobs queue up until started via the API
    #[arg(long, default_value_t = false)]
    paused: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_server(cli.serve).await
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<ServerConfig>> {
    let ConfigLoad {
        mut config,
        env_file_loaded,
        file_path,
    } = ServerConfig::load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
    if let Some(url) = args.database_url.clone() {
        config.database_url = url;
    }
    if let Some(url) = args.redis_url.clone() {
        config.redis_url = Some(url);
    }
    if let Some(count) = args.workers {
        config.pipeline.workers.count = count;
    }
    if args.paused {
        config.start_paused = true;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = file_path {
        info!(path = %path, "configuration file applied");
    }

    info!(
        workers = config.pipeline.workers.count,
        queue = if config.redis_url.is_some() {
            "redis"
        } else {
            "in-process"
        },
        database = %config.database_url,
        paused = config.start_paused,
        "pipeline configuration in effect"
    );
    if config.pipeline.workers.count == 0 {
        warn!("worker count is 0; jobs will queue but never process");
    }

    Ok(Arc::new(config))
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_runtime_config(&args)?;

    let ResourceBootstrap { state, runtime } =
        wire_pipeline(Arc::clone(&config)).await?;

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting Rampart Server (HTTP) on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The HTTP side is down; drain the workers before exiting.
    runtime.shutdown().await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install the shutdown signal handler");
        return;
    }
    info!("shutdown signal received; draining workers");
}
