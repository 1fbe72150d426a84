//! parleyd - connection roster and broadcast relay for the parley chat service.
//!
//! This crate provides the server side of parley:
//! - `roster` - actor-owned membership state: claimed names and the
//!   outbound writer of every joined session, plus the broadcast fan-out
//! - `server` - TCP accept loop and the per-connection session handler
//!   (handshake, relay loop, teardown)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │  (TcpListener)  │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────────────────┐
//! │ SessionHandler  │────▶│        RosterActor          │
//! │ (per connection)│     │ (names + peer writers owner)│
//! └─────────────────┘     └──────────────┬──────────────┘
//!                                        │ broadcast
//!                                        ▼
//!                         ┌─────────────────────────────┐
//!                         │  every joined peer's writer │
//!                         └─────────────────────────────┘
//! ```
//!
//! All production code in this crate is panic-free: no `.unwrap()`,
//! `.expect()`, `panic!()`, `unreachable!()` or `todo!()`. I/O failures
//! end the owning session; nothing propagates past it.

pub mod roster;
pub mod server;
