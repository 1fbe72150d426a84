//! Session handler for individual client connections.
//!
//! Each accepted connection gets its own `SessionHandler` that drives the
//! session through its states:
//!
//! ```text
//! Connecting → Handshaking → Active → Closing → Closed
//! ```
//!
//! Handshaking negotiates a unique display name against the roster;
//! Active relays every chat line through the roster's broadcast; Closing
//! unwinds the roster state exactly once, whatever ended the session.
//! No error crosses the session boundary - I/O failures are logged and
//! become the Closing transition.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parley_protocol::{Name, ServerLine, EXIT_COMMAND};

use crate::roster::{send_line, PeerWriter, RosterError, RosterHandle};

/// Maximum accepted line length (1 line = 1 name proposal or 1 chat
/// message).
const MAX_LINE_BYTES: usize = 8192;

/// Session handler for a single client connection.
///
/// Owns the read half outright; the write half sits behind a shared
/// [`PeerWriter`] because the roster's broadcast fan-out writes to it
/// concurrently with the handler's own replies.
pub struct SessionHandler {
    /// Buffered reader for incoming lines
    reader: BufReader<OwnedReadHalf>,

    /// Outbound writer, shared with the roster once joined
    writer: PeerWriter,

    /// Handle to the roster actor
    roster: RosterHandle,

    /// Display name, held from handshake completion until teardown
    name: Option<Name>,

    /// Unique number of this connection
    connection_number: u64,

    /// Remote endpoint, for logging
    peer_addr: SocketAddr,
}

impl SessionHandler {
    /// Creates a session handler for an accepted connection.
    pub fn new(
        stream: TcpStream,
        roster: RosterHandle,
        connection_number: u64,
        peer_addr: SocketAddr,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(BufWriter::new(Box::new(writer)))),
            roster,
            name: None,
            connection_number,
            peer_addr,
        }
    }

    /// Runs the session to completion.
    ///
    /// This is the main entry point - performs the name handshake, then
    /// relays chat lines until the client exits, disconnects or errors,
    /// and finally tears down whatever state the session acquired.
    pub async fn run(mut self) {
        debug!(
            connection = self.connection_number,
            peer = %self.peer_addr,
            "Client connected"
        );

        let name = match self.negotiate_name().await {
            Ok(name) => name,
            Err(SessionError::Eof) => {
                debug!(
                    connection = self.connection_number,
                    "Client left during handshake"
                );
                return;
            }
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Handshake failed"
                );
                return;
            }
        };

        if let Err(e) = self.relay(&name).await {
            debug!(name = %name, error = %e, "Connection closed");
        }

        self.teardown().await;
    }

    /// Handshaking: reads proposed names until one is claimed.
    ///
    /// Every refused proposal - empty, a protocol token, or already in
    /// use - gets exactly the line `Invalid` and the loop waits for the
    /// next proposal. Unbounded on purpose: the client decides how long
    /// to keep trying, and a silent one only parks this task.
    async fn negotiate_name(&mut self) -> Result<Name, SessionError> {
        loop {
            let proposal = self.read_line().await?;

            let name = match Name::parse(&proposal) {
                Ok(name) => name,
                Err(reason) => {
                    debug!(
                        connection = self.connection_number,
                        %reason,
                        "Rejected name proposal"
                    );
                    self.send(&ServerLine::Rejected).await?;
                    continue;
                }
            };

            match self.roster.claim(name.clone(), self.connection_number).await {
                Ok(()) => {
                    if let Err(e) = self.send(&ServerLine::Accepted).await {
                        // The claim must not outlive a client that never
                        // heard the acceptance.
                        self.roster.release(name, self.connection_number).await;
                        return Err(e);
                    }
                    self.name = Some(name.clone());

                    info!(
                        name = %name,
                        connection = self.connection_number,
                        "Handshake completed"
                    );
                    return Ok(name);
                }
                Err(RosterError::NameTaken(taken)) => {
                    debug!(
                        connection = self.connection_number,
                        name = %taken,
                        "Name already in use"
                    );
                    self.send(&ServerLine::Rejected).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Active state: joins the roster, announces the arrival, then relays
    /// chat lines until `exit`, EOF or an I/O error.
    async fn relay(&mut self, name: &Name) -> Result<(), SessionError> {
        self.roster
            .join(name.clone(), self.connection_number, Arc::clone(&self.writer))
            .await?;

        // The arrival notice is not excluded from its own sender: the new
        // client hears "<name> connected." like everyone else, so every
        // observer sees the same notice stream in the same order.
        self.roster
            .broadcast(ServerLine::Connected(name.clone()).to_string(), None)
            .await;

        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(SessionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            };

            if line == EXIT_COMMAND {
                debug!(name = %name, "Client requested exit");
                return Ok(());
            }

            if line.is_empty() {
                continue;
            }

            let delivered = self
                .roster
                .broadcast(
                    ServerLine::Chat {
                        from: name.clone(),
                        text: line,
                    }
                    .to_string(),
                    None,
                )
                .await;

            debug!(name = %name, delivered, "Chat line relayed");
        }
    }

    /// Closing: unwinds roster state and announces the departure.
    ///
    /// Runs exactly once per session - the name is taken out of the
    /// handler, so a second call finds nothing to do, and the roster ops
    /// are owner-checked no-ops if a broadcast failure already evicted
    /// this session. The departure notice is queued after leave/release
    /// on the same channel, so the departing client never hears it and
    /// its name is free the moment anyone observes the notice.
    async fn teardown(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };

        self.roster.leave(name.clone(), self.connection_number).await;
        self.roster
            .release(name.clone(), self.connection_number)
            .await;
        self.roster
            .broadcast(ServerLine::Disconnected(name.clone()).to_string(), None)
            .await;

        info!(name = %name, connection = self.connection_number, "Client disconnected");
    }

    /// Reads a single line, without its terminator.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(SessionError::Eof);
        }

        if line.len() > MAX_LINE_BYTES {
            return Err(SessionError::LineTooLong {
                size: line.len(),
                max: MAX_LINE_BYTES,
            });
        }

        // Strip the terminator only; interior whitespace belongs to the
        // user.
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(line)
    }

    /// Sends one protocol line to this client.
    async fn send(&self, line: &ServerLine) -> Result<(), SessionError> {
        send_line(&self.writer, &line.to_string())
            .await
            .map_err(|e| SessionError::Io(e.to_string()))
    }
}

/// Errors that can occur during session handling. None of them escape
/// the session task; they only pick the log line and end the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Underlying read or write failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The client closed the connection.
    #[error("connection closed")]
    Eof,

    /// A single line exceeded the accepted maximum.
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong {
        /// Bytes received for the line
        size: usize,
        /// The accepted maximum
        max: usize,
    },

    /// The roster actor refused or went away.
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::LineTooLong {
            size: 20_000,
            max: MAX_LINE_BYTES,
        };
        assert!(err.to_string().contains("20000"));
        assert!(err.to_string().contains("8192"));

        let err = SessionError::Eof;
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn test_roster_error_converts() {
        let name = Name::parse("alice").expect("valid test name");
        let err: SessionError = RosterError::NameTaken(name).into();
        assert!(matches!(err, SessionError::Roster(_)));
        assert!(err.to_string().contains("alice"));
    }
}
