//! Parley - terminal chat client
//!
//! Connects to a parley server, negotiates a pseudonym, then relays the
//! terminal: every typed line goes to the room, every room line goes to
//! the screen. Type `exit` (or close stdin) to leave.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default endpoint (127.0.0.1:12001)
//! parley
//!
//! # Connect elsewhere
//! parley --addr 192.0.2.1:4000
//! PARLEY_ADDR=192.0.2.1:4000 parley
//! ```

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use parley_client::{ChatClient, ClientConfig};

/// Parley - terminal chat client
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
struct Args {
    /// Server endpoint (falls back to PARLEY_ADDR, then the default)
    #[arg(short, long)]
    addr: Option<SocketAddr>,
}

fn resolve_addr(flag: Option<SocketAddr>) -> Result<SocketAddr> {
    if let Some(addr) = flag {
        return Ok(addr);
    }

    if let Ok(raw) = env::var("PARLEY_ADDR") {
        return raw
            .parse()
            .with_context(|| format!("invalid PARLEY_ADDR: {raw:?}"));
    }

    Ok(ClientConfig::default().addr)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Chat lines own stdout; diagnostics go to stderr and stay quiet
    // unless RUST_LOG says otherwise.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("parley_client=warn".parse()?))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let addr = resolve_addr(args.addr)?;
    let cancel_token = CancellationToken::new();

    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let client = ChatClient::new(ClientConfig { addr }, cancel_token);
    client.run().await.context("chat session failed")?;

    Ok(())
}
