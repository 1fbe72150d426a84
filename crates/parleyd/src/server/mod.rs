//! TCP server for the parley daemon.
//!
//! The server:
//! - Listens on a TCP endpoint for chat clients
//! - Spawns a SessionHandler for each accepted connection
//! - Supports graceful shutdown via CancellationToken
//!
//! Binding the endpoint is the only fatal failure; a failed accept is
//! logged and the loop keeps serving.

mod session;

pub use session::{SessionError, SessionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::roster::RosterHandle;

/// Default listening endpoint when neither flag nor environment says
/// otherwise.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:12001";

/// TCP server for the parley daemon.
///
/// Accepts connections and hands each one to its own session task.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Address the listener actually bound (resolves port 0 in tests)
    local_addr: SocketAddr,

    /// Handle to the roster actor, cloned into every session
    roster: RosterHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter; gives every session its unique number
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listening endpoint.
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` when the endpoint cannot be bound - fatal at
    /// startup, there is nothing to serve without it.
    pub async fn bind(
        addr: SocketAddr,
        roster: RosterHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(addr = %local_addr, "Chat server listening");

        Ok(Self {
            listener,
            local_addr,
            roster,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// A single accept error never stops the server.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            self.handle_connection(stream, peer_addr);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        info!("Chat server stopped");
    }

    /// Hands a new connection to its own spawned session task,
    /// fire-and-forget.
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let connection_number = self.connection_counter.fetch_add(1, Ordering::Relaxed);
        let roster = self.roster.clone();

        tokio::spawn(async move {
            SessionHandler::new(stream, roster, connection_number, peer_addr)
                .run()
                .await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening endpoint could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested endpoint
        addr: SocketAddr,
        /// The underlying I/O failure
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr_parses() {
        let addr: SocketAddr = DEFAULT_BIND_ADDR.parse().expect("default addr is valid");
        assert_eq!(addr.port(), 12001);
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:12001".parse().expect("valid addr"),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:12001"));
        assert!(err.to_string().contains("address in use"));
    }
}
