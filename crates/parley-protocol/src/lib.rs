//! Parley wire protocol - shared between the daemon and the client.
//!
//! The protocol is newline-delimited UTF-8 text with no framing beyond the
//! line terminator. This crate owns the literal handshake tokens, the
//! validated display-name type, and the shapes of every line the server
//! emits, so daemon and client can never disagree on the wire text.

pub mod line;
pub mod name;

// Re-exports for convenience
pub use line::{is_reserved, ServerLine, ACCEPT, EXIT_COMMAND, REJECT};
pub use name::{Name, NameError};
