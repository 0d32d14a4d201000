//! Cloudnote Broker
//!
//! HTTP service handing out presigned upload, download and listing access to
//! the notes bucket, scoped per user.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use cloudnote_broker::config::Args;
use cloudnote_broker::{api, AppState, Broker};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting Cloudnote Broker");
    let store = args.object_store().context("Failed to configure object store")?;
    if args.memory_store {
        info!("Using in-memory object store");
    } else {
        info!(
            region = ?args.region,
            bucket = ?args.bucket,
            endpoint = ?args.endpoint,
            "Using S3 object store"
        );
    }

    let state = Arc::new(AppState {
        broker: Broker::new(store),
    });

    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let app = api::router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    info!("Cloudnote Broker shutting down");
    Ok(())
}

/// Wait for a ctrl-c signal for graceful shutdown
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received ctrl-c, initiating graceful shutdown");
}
