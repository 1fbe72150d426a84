//! Chat roster using the actor pattern.
//!
//! The roster is the single owner of all membership state: which display
//! names are claimed, and the outbound writer of every session that has
//! completed the handshake. It receives commands via a tokio mpsc channel
//! and processes them sequentially, which makes every operation atomic
//! with respect to every other - two sessions racing to claim the same
//! name cannot both win.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ SessionHandler  │────▶│   RosterActor   │────▶│  peer writers    │
//! │ (one per conn)  │     │ (state owner)   │     │ (fan-out target) │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         RosterCommand           HashMap<Name, Entry>
//!         (mpsc channel)
//! ```
//!
//! Claim/release are the name registry; join/leave/broadcast are the
//! session registry. Both live in one map so a broadcast failure can
//! evict a dead peer and free its name in a single step.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

mod actor;
mod commands;
mod handle;

pub use actor::RosterActor;
pub use commands::{RosterCommand, RosterError};
pub use handle::RosterHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Bound on a single outbound write during fan-out. A recipient that
/// stalls longer than this is treated as broken and evicted; it can delay
/// delivery to peers behind it in the fan-out, but never abort it.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound byte sink for one peer. Boxed so tests can substitute an
/// in-memory duplex for a TCP write half.
pub type PeerSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to one peer's outbound writer.
///
/// The mutex serialises handshake replies and broadcast deliveries onto
/// the same buffered sink, so every line reaches the wire whole.
pub type PeerWriter = Arc<Mutex<BufWriter<PeerSink>>>;

/// Writes one line (plus terminator) to a peer and flushes, bounded by
/// [`WRITE_TIMEOUT`].
pub async fn send_line(writer: &PeerWriter, line: &str) -> io::Result<()> {
    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok::<(), io::Error>(())
    })
    .await
    {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}

/// Spawn the roster actor and return a handle for interaction.
///
/// The actor runs until every handle is dropped and the command channel
/// closes.
pub fn spawn_roster() -> RosterHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RosterActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RosterHandle::new(cmd_tx)
}
