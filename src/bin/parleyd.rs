//! Parley daemon - central chat relay server
//!
//! This binary runs the chat server: it accepts TCP clients, negotiates a
//! unique pseudonym with each one, and relays every chat line to all
//! connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default endpoint (127.0.0.1:12001)
//! parleyd
//!
//! # Listen elsewhere
//! parleyd --bind 0.0.0.0:4000
//! PARLEY_ADDR=0.0.0.0:4000 parleyd
//! ```

use std::env;
use std::net::SocketAddr;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parleyd::roster::spawn_roster;
use parleyd::server::{ChatServer, DEFAULT_BIND_ADDR};

/// Parley daemon - chat relay server
#[derive(Parser, Debug)]
#[command(name = "parleyd", version, about)]
struct Args {
    /// Endpoint to listen on (falls back to PARLEY_ADDR, then the default)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn resolve_bind_addr(flag: Option<SocketAddr>) -> Result<SocketAddr> {
    if let Some(addr) = flag {
        return Ok(addr);
    }

    if let Ok(raw) = env::var("PARLEY_ADDR") {
        return raw
            .parse()
            .with_context(|| format!("invalid PARLEY_ADDR: {raw:?}"));
    }

    DEFAULT_BIND_ADDR
        .parse()
        .context("default bind address is malformed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("parleyd=info".parse()?)
                .add_directive("parley_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Parley daemon starting"
    );

    let addr = resolve_bind_addr(args.bind)?;
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let roster = spawn_roster();
    info!("Roster started");

    let server = ChatServer::bind(addr, roster, cancel_token)
        .await
        .context("failed to start server")?;
    server.run().await;

    info!("Parley daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
