//! Client interface for interacting with the RosterActor.
//!
//! The `RosterHandle` is a cheap-to-clone handle that sends commands to
//! the roster actor. One handle is cloned into every session task.
//!
//! Commands from a single handle are processed in send order, which is
//! what makes a session's `leave`/`release` land before the departure
//! broadcast it queues right after.

use parley_protocol::Name;
use tokio::sync::{mpsc, oneshot};

use super::commands::{RosterCommand, RosterError};
use super::PeerWriter;

/// Handle for interacting with the roster actor.
#[derive(Clone)]
pub struct RosterHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RosterCommand>,
}

impl RosterHandle {
    /// Creates a new roster handle over the actor's command channel.
    pub fn new(sender: mpsc::Sender<RosterCommand>) -> Self {
        Self { sender }
    }

    /// Claims `name` for `session`, atomically.
    ///
    /// # Errors
    ///
    /// - `RosterError::NameTaken` if another live session holds the name
    /// - `RosterError::ChannelClosed` if the actor has shut down
    pub async fn claim(&self, name: Name, session: u64) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::Claim {
                name,
                session,
                respond_to: tx,
            })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Releases `name` if `session` holds it. Idempotent, fire-and-forget
    /// (send errors mean the actor is shutting down and the state is gone
    /// anyway).
    pub async fn release(&self, name: Name, session: u64) {
        let _ = self
            .sender
            .send(RosterCommand::Release { name, session })
            .await;
    }

    /// Registers the session's outbound writer so it receives broadcasts.
    ///
    /// # Errors
    ///
    /// - `RosterError::NotClaimed` if `session` does not hold `name`
    /// - `RosterError::ChannelClosed` if the actor has shut down
    pub async fn join(
        &self,
        name: Name,
        session: u64,
        writer: PeerWriter,
    ) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::Join {
                name,
                session,
                writer,
                respond_to: tx,
            })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Unregisters the session from broadcasts if it holds `name`.
    /// Idempotent, fire-and-forget.
    pub async fn leave(&self, name: Name, session: u64) {
        let _ = self
            .sender
            .send(RosterCommand::Leave { name, session })
            .await;
    }

    /// Delivers `line` to every joined peer except `exclude`, best-effort.
    ///
    /// Returns the number of peers the line actually reached; 0 if the
    /// actor has shut down.
    pub async fn broadcast(&self, line: String, exclude: Option<Name>) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RosterCommand::Broadcast {
                line,
                exclude,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Number of currently joined peers; 0 if the actor has shut down.
    pub async fn peer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RosterCommand::PeerCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::parse(s).expect("valid test name")
    }

    fn create_test_handle() -> (RosterHandle, mpsc::Receiver<RosterCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        (RosterHandle::new(cmd_tx), cmd_rx)
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let _cloned = handle.clone();
    }

    #[tokio::test]
    async fn test_claim_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RosterCommand::Claim {
                name,
                session,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(name.as_str(), "alice");
                assert_eq!(session, 7);
                let _ = respond_to.send(Ok(()));
                return true;
            }
            false
        });

        let result = handle.claim(name("alice"), 7).await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.claim(name("alice"), 1).await;
        assert_eq!(result, Err(RosterError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_broadcast_returns_zero_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let delivered = handle.broadcast("hello".to_string(), None).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_release_ignores_closed_channel() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        // Must not panic or error.
        handle.release(name("alice"), 1).await;
        handle.leave(name("alice"), 1).await;
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();
        assert!(handle.is_connected());

        drop(rx);
        handle.release(name("alice"), 1).await;
        assert!(!handle.is_connected());
    }
}
