//! Terminal client for the parley chat server.
//!
//! Connects over TCP, negotiates a pseudonym with the server, then runs
//! two concurrent loops: one printing every server line to the terminal,
//! one forwarding typed lines to the server until `exit`.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside of tests.

pub mod client;
pub mod error;

pub use client::{ChatClient, ClientConfig};
pub use error::{ClientError, Result};
