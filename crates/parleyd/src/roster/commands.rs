//! Roster actor commands and errors.
//!
//! Commands that need an answer carry a oneshot channel for the response;
//! the cleanup commands (`Release`, `Leave`) are fire-and-forget because
//! they are idempotent and their ordering against a later `Broadcast` from
//! the same handle is already guaranteed by the mpsc channel.

use parley_protocol::Name;
use thiserror::Error;
use tokio::sync::oneshot;

use super::PeerWriter;

/// Commands sent to the roster actor.
pub enum RosterCommand {
    /// Claim a display name for a session: atomic check-and-insert.
    ///
    /// # Errors
    /// - `RosterError::NameTaken` if the name is already claimed (no side
    ///   effect in that case)
    Claim {
        /// The proposed name
        name: Name,
        /// Connection number of the claiming session
        session: u64,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RosterError>>,
    },

    /// Release a claimed name.
    ///
    /// A no-op unless `session` is the current holder, so a stale teardown
    /// can never free a name that was already evicted and re-claimed.
    Release {
        /// The name to release
        name: Name,
        /// Connection number of the releasing session
        session: u64,
    },

    /// Register a session's outbound writer, making it a broadcast
    /// recipient.
    ///
    /// # Errors
    /// - `RosterError::NotClaimed` if `session` does not hold `name`
    Join {
        /// The name claimed during the handshake
        name: Name,
        /// Connection number of the joining session
        session: u64,
        /// Outbound writer for delivering broadcasts
        writer: PeerWriter,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RosterError>>,
    },

    /// Unregister a session's outbound writer. Owner-checked and
    /// idempotent, like `Release`. The name stays claimed until released.
    Leave {
        /// The name of the leaving session
        name: Name,
        /// Connection number of the leaving session
        session: u64,
    },

    /// Deliver one line to every joined peer, best-effort.
    ///
    /// Peers whose writer fails (or times out) are evicted: removed as
    /// recipients and their name freed, without disturbing delivery to
    /// the rest. Responds with the number of successful deliveries.
    Broadcast {
        /// The full line to deliver (terminator appended on the wire)
        line: String,
        /// Session to skip, if any
        exclude: Option<Name>,
        /// Channel to send the delivery count
        respond_to: oneshot::Sender<usize>,
    },

    /// Count the currently joined peers.
    PeerCount {
        /// Channel to send the count
        respond_to: oneshot::Sender<usize>,
    },
}

/// Errors that can occur during roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The name is already claimed by a live session.
    #[error("name already in use: {0}")]
    NameTaken(Name),

    /// A join was attempted without (or after losing) the claim.
    #[error("name not claimed by this session: {0}")]
    NotClaimed(Name),

    /// The actor has shut down and the command channel is closed.
    #[error("roster channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::parse(s).expect("valid test name")
    }

    #[test]
    fn test_roster_error_display() {
        let err = RosterError::NameTaken(name("alice"));
        assert_eq!(err.to_string(), "name already in use: alice");

        let err = RosterError::NotClaimed(name("bob"));
        assert_eq!(err.to_string(), "name not claimed by this session: bob");

        let err = RosterError::ChannelClosed;
        assert_eq!(err.to_string(), "roster channel closed");
    }

    #[tokio::test]
    async fn test_command_oneshot_pattern() {
        let (tx, rx) = oneshot::channel::<Result<(), RosterError>>();

        tokio::spawn(async move {
            tx.send(Ok(())).ok();
        });

        let result = rx.await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
    }
}
