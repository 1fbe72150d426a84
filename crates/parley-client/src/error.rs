//! Error types for the parley client.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur in the chat client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server endpoint could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// The endpoint that refused us
        addr: SocketAddr,
        /// The underlying I/O failure
        source: std::io::Error,
    },

    /// Reading or writing the connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection mid-handshake.
    #[error("server closed the connection")]
    ServerClosed,

    /// The local input stream ended before a pseudonym was accepted.
    #[error("input closed before a pseudonym was accepted")]
    InputClosed,

    /// The server answered the handshake with something other than the
    /// accept or reject token.
    #[error("unexpected handshake reply: {0:?}")]
    UnexpectedReply(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Connect {
            addr: "127.0.0.1:12001".parse().expect("valid addr"),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.to_string().contains("127.0.0.1:12001"));
        assert!(err.to_string().contains("refused"));

        let err = ClientError::UnexpectedReply("Banana".to_string());
        assert!(err.to_string().contains("Banana"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: ClientError = io.into();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
