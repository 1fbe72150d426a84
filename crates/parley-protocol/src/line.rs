//! Literal wire tokens and the server's line shapes.

use std::fmt;

use crate::name::Name;

/// Handshake reply: the proposed name was free and is now claimed.
pub const ACCEPT: &str = "Valid";

/// Handshake reply: the proposed name was refused; propose another.
pub const REJECT: &str = "Invalid";

/// Client command requesting graceful departure. Case-sensitive.
pub const EXIT_COMMAND: &str = "exit";

/// Checks whether a token is one of the literal protocol words and
/// therefore unusable as a display name.
pub fn is_reserved(token: &str) -> bool {
    matches!(token, ACCEPT | REJECT | EXIT_COMMAND)
}

/// Every line the server can emit, with its exact wire text as `Display`.
///
/// Keeping the formats in one place means the relay, the notices and the
/// handshake replies cannot drift apart between daemon and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Handshake acceptance (`Valid`).
    Accepted,

    /// Handshake rejection (`Invalid`).
    Rejected,

    /// System notice: a named client joined.
    Connected(Name),

    /// System notice: a named client left, gracefully or not.
    Disconnected(Name),

    /// A relayed chat line.
    Chat {
        /// Display name of the sender.
        from: Name,
        /// The text as the sender typed it (terminator stripped).
        text: String,
    },
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "{ACCEPT}"),
            Self::Rejected => write!(f, "{REJECT}"),
            Self::Connected(name) => write!(f, "{name} connected."),
            Self::Disconnected(name) => write!(f, "{name} disconnected."),
            Self::Chat { from, text } => write!(f, "{from} said : {text}"),
        }
    }
}
