//! TCP server for the chat relay.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Bounds concurrently served connections with a semaphore
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept() + semaphore permit
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ append
//!         ▼
//! ┌─────────────────┐
//! │   ActivityLog   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionSettings};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityLog;
use crate::registry::RegistryHandle;

/// Default number of connections served at once.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// TCP server for the chat relay.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Activity log shared by all connections
    activity: ActivityLog,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Per-connection limits
    settings: ConnectionSettings,

    /// Slots for concurrently served connections
    slots: Arc<Semaphore>,
}

impl ChatServer {
    /// Binds the listener.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to listen on (port 0 picks a free port)
    /// * `registry` - Handle to the session registry
    /// * `activity` - Activity log sink
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        addr: SocketAddr,
        registry: RegistryHandle,
        activity: ActivityLog,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            activity,
            cancel_token,
            settings: ConnectionSettings::default(),
            slots: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
        })
    }

    /// Replaces the per-connection limits.
    pub fn with_settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets how many connections are served at once. Further connections
    /// are accepted but wait for a free slot before seeing `SUBMITNAME`.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Io(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// In-flight connections keep running until their streams close.
    pub async fn run(self) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(addr = %addr, "Chat server listening");
        }

        // Connection counter for log correlation
        let mut connection_counter: u64 = 0;

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            connection_counter += 1;
                            self.handle_connection(stream, peer, connection_counter);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Spawns a handler task that waits for a free slot, then serves the
    /// connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection_number: u64) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let registry = self.registry.clone();
        let activity = self.activity.clone();
        let settings = self.settings;
        let slots = Arc::clone(&self.slots);

        tokio::spawn(async move {
            if slots.available_permits() == 0 {
                debug!(peer = %peer, "Connection limit reached, waiting for a slot");
            }
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(peer = %peer, "Connection slots closed, dropping connection");
                    return;
                }
            };

            debug!(peer = %peer, connection = connection_number, "Serving connection");

            let (reader, writer) = stream.into_split();
            let handler = ConnectionHandler::new(
                reader,
                writer,
                registry,
                activity,
                settings,
                connection_number,
            );

            if let Some(name) = handler.run().await {
                debug!(peer = %peer, name = %name, "Connection finished");
            }
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("I/O error: {0}")]
    Io(String),
}
