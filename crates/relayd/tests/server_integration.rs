//! Integration tests for the TCP chat server.
//!
//! These tests verify the ChatServer works correctly as a complete system:
//! name negotiation, join and leave announcements, coordinator handoff,
//! broadcast and private routing, and graceful shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use relayd::activity::ActivityLog;
use relayd::registry::{spawn_registry, RegistryHandle};
use relayd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an expected line
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Window in which an unexpected line would have arrived
const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server on an ephemeral loopback port.
    async fn spawn() -> Self {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            registry.clone(),
            ActivityLog::disabled(),
            cancel_token.clone(),
        )
        .await
        .expect("bind server");
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            registry,
            cancel_token,
        }
    }

    /// Opens a raw connection.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and claims `name`, consuming the negotiation lines.
    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.claim(name).await;
        client
    }

    /// Shuts down the server gracefully.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Test client connection with protocol helpers.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write line");
    }

    /// Receives the next line with `(HH:mm)` stamps replaced by a fixed
    /// marker.
    async fn recv(&mut self) -> String {
        self.recv_timeout(RECV_TIMEOUT)
            .await
            .expect("expected a line from the server")
    }

    async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        let mut line = String::new();
        match timeout(duration, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some(normalize_times(line.trim_end_matches(|c| c == '\r' || c == '\n'))),
            Ok(Err(e)) => panic!("read failed: {e}"),
            Err(_) => None,
        }
    }

    /// Asserts that nothing arrives within the quiet period.
    async fn expect_silence(&mut self) {
        if let Some(line) = self.recv_timeout(QUIET_PERIOD).await {
            panic!("unexpected line: {line}");
        }
    }

    /// Asserts that the server closes the connection.
    async fn expect_closed(&mut self) {
        let mut line = String::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("server did not close the connection");
        assert!(
            matches!(read, Ok(0) | Err(_)),
            "expected EOF, got {line:?}"
        );
    }

    async fn claim(&mut self, name: &str) {
        assert_eq!(self.recv().await, "SUBMITNAME");
        self.send(name).await;
        assert_eq!(self.recv().await, format!("NAMEACCEPTED {name}"));
    }
}

/// Replaces every `(dd:dd)` with `(HH:mm)`.
fn normalize_times(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < line.len() {
        let is_stamp = i + 7 <= bytes.len()
            && bytes[i] == b'('
            && bytes[i + 1].is_ascii_digit()
            && bytes[i + 2].is_ascii_digit()
            && bytes[i + 3] == b':'
            && bytes[i + 4].is_ascii_digit()
            && bytes[i + 5].is_ascii_digit()
            && bytes[i + 6] == b')';

        if is_stamp {
            out.push_str("(HH:mm)");
            i += 7;
        } else {
            let ch = line[i..].chars().next().expect("char boundary");
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    out
}

/// Joins alice, bob and carol in that order and drains every
/// announcement so each client starts with an empty stream.
async fn three_members(server: &TestServer) -> (TestClient, TestClient, TestClient) {
    let mut alice = server.join("alice").await;
    alice.recv().await; // first-member notice
    alice.recv().await; // COORDINATOR alice

    let mut bob = server.join("bob").await;
    for _ in 0..3 {
        alice.recv().await;
    }
    for _ in 0..2 {
        bob.recv().await;
    }

    let mut carol = server.join("carol").await;
    for _ in 0..3 {
        alice.recv().await;
        bob.recv().await;
    }
    for _ in 0..2 {
        carol.recv().await;
    }

    (alice, bob, carol)
}

// ============================================================================
// Join Tests
// ============================================================================

#[tokio::test]
async fn test_first_member_is_told_it_is_coordinator() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    assert_eq!(
        alice.recv().await,
        "MESSAGE You are the first to join and the coordinator of this chat (HH:mm)"
    );
    assert_eq!(alice.recv().await, "COORDINATOR alice");
    alice.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_second_member_join_is_announced() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    let mut bob = server.join("bob").await;

    // The joiner gets the roster but not its own join notice.
    assert_eq!(bob.recv().await, "COORDINATOR alice");
    assert_eq!(bob.recv().await, "MEMBERS [alice, bob]");

    assert_eq!(alice.recv().await, "MESSAGE bob has joined (HH:mm)");
    assert_eq!(alice.recv().await, "COORDINATOR alice");
    assert_eq!(alice.recv().await, "MEMBERS [alice, bob]");

    alice.expect_silence().await;
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_members_rendering_is_sorted() {
    let server = TestServer::spawn().await;

    let mut zed = server.join("zed").await;
    zed.recv().await;
    zed.recv().await;

    let mut amy = server.join("amy").await;
    assert_eq!(amy.recv().await, "COORDINATOR zed");
    assert_eq!(amy.recv().await, "MEMBERS [amy, zed]");

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_name_is_prompted_again() {
    let server = TestServer::spawn().await;
    let _alice = server.join("alice").await;

    let mut other = server.connect().await;
    assert_eq!(other.recv().await, "SUBMITNAME");
    other.send("alice").await;
    assert_eq!(other.recv().await, "SUBMITNAME");
    other.send("alice2").await;
    assert_eq!(other.recv().await, "NAMEACCEPTED alice2");

    let roster = server.registry.members().await;
    assert_eq!(roster.len(), 2);

    server.shutdown().await;
}

// ============================================================================
// Messaging Tests
// ============================================================================

#[tokio::test]
async fn test_chat_reaches_everyone_including_sender() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, mut carol) = three_members(&server).await;

    bob.send("hello all").await;

    for client in [&mut alice, &mut bob, &mut carol] {
        assert_eq!(client.recv().await, "MESSAGE bob(HH:mm): hello all");
        client.expect_silence().await;
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_message_reaches_only_target() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, mut carol) = three_members(&server).await;

    alice.send("/[bob]see you at noon").await;

    assert_eq!(bob.recv().await, "MESSAGE alice(pm)(HH:mm): see you at noon");
    assert_eq!(alice.recv().await, "MESSAGE pm to bob(HH:mm): see you at noon");
    carol.expect_silence().await;
    alice.expect_silence().await;
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_message_to_unknown_member() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, mut carol) = three_members(&server).await;

    alice.send("/[dave]hi").await;

    assert_eq!(alice.recv().await, "MESSAGE Wrong use of command! (HH:mm)");
    alice.expect_silence().await;
    bob.expect_silence().await;
    carol.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_message_keeps_empty_body() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, _carol) = three_members(&server).await;

    bob.send("/[alice]").await;

    assert_eq!(alice.recv().await, "MESSAGE bob(pm)(HH:mm): ");
    assert_eq!(bob.recv().await, "MESSAGE pm to alice(HH:mm): ");

    server.shutdown().await;
}

// ============================================================================
// Departure Tests
// ============================================================================

#[tokio::test]
async fn test_coordinator_departure_hands_off_to_smallest_name() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, mut carol) = three_members(&server).await;

    alice.send("/quit").await;
    alice.expect_closed().await;

    for client in [&mut bob, &mut carol] {
        assert_eq!(
            client.recv().await,
            "MESSAGE alice has left. The new coordinator is: bob(HH:mm)"
        );
        assert_eq!(client.recv().await, "COORDINATOR bob");
        assert_eq!(client.recv().await, "MEMBERS [bob, carol]");
    }

    let roster = server.registry.members().await;
    assert_eq!(roster.coordinator().map(|n| n.as_str()), Some("bob"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_member_departure_keeps_coordinator() {
    let server = TestServer::spawn().await;
    let (mut alice, mut bob, mut carol) = three_members(&server).await;

    carol.writer.shutdown().await.unwrap();
    carol.expect_closed().await;

    for client in [&mut alice, &mut bob] {
        assert_eq!(client.recv().await, "MESSAGE carol has left (HH:mm)");
        assert_eq!(client.recv().await, "COORDINATOR alice");
        assert_eq!(client.recv().await, "MEMBERS [alice, bob]");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_coordinator_is_reestablished_after_room_empties() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    alice.recv().await;
    alice.recv().await;
    alice.send("/QUIT").await;
    alice.expect_closed().await;

    // Wait for the departure to be processed.
    let start = tokio::time::Instant::now();
    while !server.registry.members().await.is_empty() {
        assert!(start.elapsed() < RECV_TIMEOUT, "alice was never removed");
        sleep(Duration::from_millis(10)).await;
    }

    let mut bob = server.join("bob").await;
    assert_eq!(
        bob.recv().await,
        "MESSAGE You are the first to join and the coordinator of this chat (HH:mm)"
    );
    assert_eq!(bob.recv().await, "COORDINATOR bob");

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::spawn().await;
    let addr = server.addr;
    server.shutdown().await;

    let result = timeout(RECV_TIMEOUT, TcpStream::connect(addr)).await;
    assert!(
        matches!(result, Ok(Err(_))),
        "connection should be refused after shutdown"
    );
}
