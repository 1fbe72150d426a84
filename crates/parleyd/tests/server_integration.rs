//! Integration tests for the TCP chat server.
//!
//! These tests run the full daemon stack - accept loop, session handshake,
//! relay, teardown - against real sockets on a loopback port, speaking the
//! actual wire protocol (`Valid`/`Invalid`, notices, `exit`).
//!
//! Tests CAN use `.unwrap()` and `.expect()` - the panic-free policy
//! applies to production code only.

use std::net::SocketAddr;
use std::time::Duration;

use parleyd::roster::spawn_roster;
use parleyd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an expected line
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a connection must stay silent before we call it drained
const QUIET_PERIOD: Duration = Duration::from_millis(200);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context: a running ChatServer on an ephemeral port.
struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a new chat server in the background.
    async fn spawn() -> Self {
        let roster = spawn_roster();
        let cancel_token = CancellationToken::new();

        let bind_addr: SocketAddr = "127.0.0.1:0".parse().expect("loopback addr");
        let server = ChatServer::bind(bind_addr, roster, cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(async move {
            server.run().await;
        });

        Self { addr, cancel_token }
    }

    /// Opens a raw connection, handshake not yet performed.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes the handshake under `name`.
    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send_line(name).await;
        assert_eq!(client.read_line().await, "Valid");
        client
    }

    /// Shuts down the server.
    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

/// Test client connection with line-protocol helpers.
struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("write line");
        self.writer.write_all(b"\n").await.expect("write terminator");
        self.writer.flush().await.expect("flush");
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        let bytes_read = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read line");
        assert!(bytes_read > 0, "server closed the connection");
        line.trim_end().to_string()
    }

    /// Reads whatever arrives until the connection goes quiet (or closes)
    /// and returns it.
    async fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            match timeout(QUIET_PERIOD, self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
                Ok(Ok(_)) => lines.push(line.trim_end().to_string()),
            }
        }
        lines
    }
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_handshake_accepts_free_name() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send_line("alice").await;
    assert_eq!(client.read_line().await, "Valid");

    server.shutdown();
}

#[tokio::test]
async fn test_handshake_rejects_empty_and_reserved_names() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    for bad in ["", "Valid", "Invalid", "exit"] {
        client.send_line(bad).await;
        assert_eq!(client.read_line().await, "Invalid", "proposal {bad:?}");
    }

    // The same connection can still succeed afterwards.
    client.send_line("carol").await;
    assert_eq!(client.read_line().await, "Valid");

    server.shutdown();
}

#[tokio::test]
async fn test_duplicate_name_rejected_until_freed() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");

    // Bob proposes the taken name, retries, and succeeds; alice observes
    // her own arrival first, then bob's.
    let mut bob = server.connect().await;
    bob.send_line("alice").await;
    assert_eq!(bob.read_line().await, "Invalid");
    bob.send_line("bob").await;
    assert_eq!(bob.read_line().await, "Valid");

    assert_eq!(bob.read_line().await, "bob connected.");
    assert_eq!(alice.read_line().await, "bob connected.");

    server.shutdown();
}

#[tokio::test]
async fn test_abandoned_handshake_leaves_no_claim() {
    let server = TestServer::spawn().await;

    // Propose nothing and leave.
    let quitter = server.connect().await;
    drop(quitter);

    // Get rejected and leave mid-retry.
    let mut alice = server.join("alice").await;
    let mut loser = server.connect().await;
    loser.send_line("alice").await;
    assert_eq!(loser.read_line().await, "Invalid");
    drop(loser);

    // Neither ghost claimed anything or became a peer.
    assert_eq!(alice.read_line().await, "alice connected.");
    let residue = alice.drain().await;
    assert!(residue.is_empty(), "unexpected lines: {residue:?}");

    server.shutdown();
}

// ============================================================================
// Relay
// ============================================================================

#[tokio::test]
async fn test_chat_line_reaches_everyone_including_sender() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    let mut bob = server.join("bob").await;
    assert_eq!(bob.read_line().await, "bob connected.");
    assert_eq!(alice.read_line().await, "bob connected.");

    alice.send_line("hi").await;
    assert_eq!(alice.read_line().await, "alice said : hi");
    assert_eq!(bob.read_line().await, "alice said : hi");

    server.shutdown();
}

#[tokio::test]
async fn test_one_senders_lines_arrive_in_order() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    let mut bob = server.join("bob").await;
    assert_eq!(bob.read_line().await, "bob connected.");
    assert_eq!(alice.read_line().await, "bob connected.");

    alice.send_line("one").await;
    alice.send_line("two").await;
    alice.send_line("three").await;

    assert_eq!(bob.read_line().await, "alice said : one");
    assert_eq!(bob.read_line().await, "alice said : two");
    assert_eq!(bob.read_line().await, "alice said : three");

    server.shutdown();
}

#[tokio::test]
async fn test_empty_chat_lines_are_ignored() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    let mut bob = server.join("bob").await;
    assert_eq!(bob.read_line().await, "bob connected.");
    assert_eq!(alice.read_line().await, "bob connected.");

    alice.send_line("").await;
    alice.send_line("ping").await;

    // Nothing was relayed for the empty line.
    assert_eq!(bob.read_line().await, "alice said : ping");

    server.shutdown();
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_exit_announces_departure_once_and_frees_name() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    let mut bob = server.join("bob").await;
    assert_eq!(bob.read_line().await, "bob connected.");
    assert_eq!(alice.read_line().await, "bob connected.");

    alice.send_line("exit").await;
    assert_eq!(bob.read_line().await, "alice disconnected.");

    // Exactly one departure notice.
    let rest = bob.drain().await;
    assert!(
        !rest.iter().any(|line| line == "alice disconnected."),
        "duplicate departure notice: {rest:?}"
    );

    // The name is free again the moment the notice was observed.
    let mut successor = server.join("alice").await;
    assert_eq!(successor.read_line().await, "alice connected.");
    assert_eq!(bob.read_line().await, "alice connected.");

    server.shutdown();
}

#[tokio::test]
async fn test_abrupt_disconnect_announces_departure_once() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    let bob = server.join("bob").await;
    assert_eq!(alice.read_line().await, "bob connected.");

    // No exit, no goodbye: the socket just dies.
    drop(bob);

    assert_eq!(alice.read_line().await, "bob disconnected.");
    let rest = alice.drain().await;
    assert!(
        !rest.iter().any(|line| line == "bob disconnected."),
        "duplicate departure notice: {rest:?}"
    );

    // Crash and graceful exit free the name the same way.
    let _bob_again = server.join("bob").await;
    assert_eq!(alice.read_line().await, "bob connected.");

    server.shutdown();
}

// ============================================================================
// Server lifecycle
// ============================================================================

#[tokio::test]
async fn test_server_survives_client_churn() {
    let server = TestServer::spawn().await;

    for i in 0..5 {
        let client = server.join(&format!("guest-{i}")).await;
        drop(client);
    }

    // Still accepting and relaying after the churn.
    let mut alice = server.join("alice").await;
    assert_eq!(alice.read_line().await, "alice connected.");
    alice.send_line("still here").await;
    assert_eq!(alice.read_line().await, "alice said : still here");

    server.shutdown();
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let server = TestServer::spawn().await;

    let roster = spawn_roster();
    let result = ChatServer::bind(server.addr, roster, CancellationToken::new()).await;
    assert!(result.is_err(), "second bind on the same port must fail");

    server.shutdown();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::spawn().await;
    let addr = server.addr;
    server.shutdown();

    // Give the accept loop a moment to observe the cancellation.
    tokio::time::sleep(QUIET_PERIOD).await;

    let refused = TcpStream::connect(addr).await;
    assert!(refused.is_err(), "listener should be gone after shutdown");
}
