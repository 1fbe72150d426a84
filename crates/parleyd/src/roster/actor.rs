//! Roster actor - owns all membership state and processes commands.
//!
//! One entry per claimed name. The entry records which connection holds
//! the claim and, once the session has joined, its outbound writer. The
//! actor runs in a single task and handles commands sequentially, so no
//! two sessions can observe a name as free at the same time, and a
//! session's own broadcasts are delivered to any fixed recipient in the
//! order they were sent.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;

use parley_protocol::Name;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::commands::{RosterCommand, RosterError};
use super::{send_line, PeerWriter};

/// State held for one claimed name.
struct Entry {
    /// Connection number of the claiming session; release and leave only
    /// act when the caller matches.
    session: u64,

    /// Outbound writer, present once the session has joined.
    writer: Option<PeerWriter>,
}

/// The roster actor - single owner of claimed names and joined peers.
pub struct RosterActor {
    /// Command receiver
    receiver: mpsc::Receiver<RosterCommand>,

    /// Claimed names. Key present = name claimed; writer present = the
    /// session is joined and receives broadcasts.
    entries: HashMap<Name, Entry>,
}

impl RosterActor {
    /// Creates a new roster actor reading commands from `receiver`.
    pub fn new(receiver: mpsc::Receiver<RosterCommand>) -> Self {
        Self {
            receiver,
            entries: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Roster actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(names = self.entries.len(), "Roster actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    async fn handle_command(&mut self, cmd: RosterCommand) {
        match cmd {
            RosterCommand::Claim {
                name,
                session,
                respond_to,
            } => {
                let result = self.handle_claim(name, session);
                // Ignore send error - the session may already be gone
                let _ = respond_to.send(result);
            }
            RosterCommand::Release { name, session } => {
                self.handle_release(&name, session);
            }
            RosterCommand::Join {
                name,
                session,
                writer,
                respond_to,
            } => {
                let result = self.handle_join(name, session, writer);
                let _ = respond_to.send(result);
            }
            RosterCommand::Leave { name, session } => {
                self.handle_leave(&name, session);
            }
            RosterCommand::Broadcast {
                line,
                exclude,
                respond_to,
            } => {
                let delivered = self.handle_broadcast(&line, exclude.as_ref()).await;
                let _ = respond_to.send(delivered);
            }
            RosterCommand::PeerCount { respond_to } => {
                let _ = respond_to.send(self.peer_count());
            }
        }
    }

    /// Atomic check-and-insert of a name claim.
    fn handle_claim(&mut self, name: Name, session: u64) -> Result<(), RosterError> {
        match self.entries.entry(name) {
            MapEntry::Vacant(slot) => {
                debug!(name = %slot.key(), session, "name claimed");
                slot.insert(Entry {
                    session,
                    writer: None,
                });
                Ok(())
            }
            MapEntry::Occupied(slot) => Err(RosterError::NameTaken(slot.key().clone())),
        }
    }

    /// Frees a name iff `session` holds it. Idempotent.
    fn handle_release(&mut self, name: &Name, session: u64) {
        if self
            .entries
            .get(name)
            .is_some_and(|entry| entry.session == session)
        {
            self.entries.remove(name);
            debug!(name = %name, session, "name released");
        }
    }

    /// Installs a session's outbound writer, making it a broadcast
    /// recipient. Requires a matching prior claim.
    fn handle_join(
        &mut self,
        name: Name,
        session: u64,
        writer: PeerWriter,
    ) -> Result<(), RosterError> {
        let joined = match self.entries.get_mut(&name) {
            Some(entry) if entry.session == session => {
                entry.writer = Some(writer);
                true
            }
            _ => false,
        };

        if joined {
            info!(name = %name, session, peers = self.peer_count(), "peer joined");
            Ok(())
        } else {
            Err(RosterError::NotClaimed(name))
        }
    }

    /// Removes a session from the broadcast recipients iff it holds the
    /// name. The claim itself stays until released. Idempotent.
    fn handle_leave(&mut self, name: &Name, session: u64) {
        if let Some(entry) = self.entries.get_mut(name) {
            if entry.session == session {
                entry.writer = None;
                debug!(name = %name, session, "peer left");
            }
        }
    }

    /// Best-effort fan-out of one line to every joined peer.
    ///
    /// A peer whose write fails or times out is evicted on the spot: its
    /// entry goes away entirely, which unregisters it and frees its name
    /// in one step. Delivery to the remaining peers continues. The evicted
    /// session's own teardown later becomes a no-op through the owner
    /// checks, so no duplicate departure notice can arise from this path.
    async fn handle_broadcast(&mut self, line: &str, exclude: Option<&Name>) -> usize {
        // Snapshot the recipients first; eviction below must not fight the
        // iteration.
        let recipients: Vec<(Name, PeerWriter)> = self
            .entries
            .iter()
            .filter(|&(name, _)| exclude != Some(name))
            .filter_map(|(name, entry)| {
                entry
                    .writer
                    .as_ref()
                    .map(|writer| (name.clone(), Arc::clone(writer)))
            })
            .collect();

        let mut delivered = 0usize;
        let mut failed: Vec<Name> = Vec::new();

        for (name, writer) in recipients {
            match send_line(&writer, line).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(name = %name, error = %e, "delivery failed");
                    failed.push(name);
                }
            }
        }

        for name in failed {
            self.entries.remove(&name);
            warn!(name = %name, "peer evicted after failed delivery");
        }

        delivered
    }

    /// Number of joined peers (claimed names with a writer installed).
    fn peer_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.writer.is_some())
            .count()
    }
}
