//! Connection handler for individual chat members.
//!
//! Each connection gets its own `ConnectionHandler` that:
//! - Negotiates a unique name with the registry
//! - Announces the arrival and the current roster
//! - Routes chat and private lines through the registry
//! - Unregisters and announces the departure exactly once
//!
//! Outgoing lines never go straight to the socket. They are queued on the
//! member's outbound channel and written by a dedicated writer task, so the
//! registry can deliver to this member without waiting on its socket.
//!
//! ```text
//! socket ──read_line──▶ ConnectionHandler ──commands──▶ RegistryHandle
//!                              │                             │
//!                              └──────▶ outbound queue ◀─────┘
//!                                            │
//!                                       writer task ──▶ socket
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use relay_core::{now_hhmm, MemberName};
use relay_protocol::{notice, ClientLine, PrivateMessage, ServerLine};

use crate::activity::{ActivityEvent, ActivityLog};
use crate::registry::{
    CoordinatorChange, Delivery, Outbound, Registration, RegistryError, RegistryHandle,
};

/// Default lines queued per member before further lines are dropped.
const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Default write timeout (10 seconds)
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum input line length (64 KiB)
const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Capacity of the member's outbound queue.
    pub outbound_buffer: usize,

    /// Time allowed for writing a single line to the socket.
    pub write_timeout: Duration,

    /// Longest accepted input line, terminator excluded.
    pub max_line_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Connection handler for a single member.
///
/// Generic over the two stream halves so that tests can drive it with
/// in-memory pipes.
pub struct ConnectionHandler<R, W> {
    reader: R,
    writer: W,
    registry: RegistryHandle,
    activity: ActivityLog,
    settings: ConnectionSettings,
    connection_number: u64,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the stream
    /// * `writer` - Write half of the stream
    /// * `registry` - Handle to the session registry
    /// * `activity` - Activity log sink
    /// * `settings` - Per-connection limits
    /// * `connection_number` - Unique number for this connection, used in logs
    pub fn new(
        reader: R,
        writer: W,
        registry: RegistryHandle,
        activity: ActivityLog,
        settings: ConnectionSettings,
        connection_number: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            registry,
            activity,
            settings,
            connection_number,
        }
    }

    /// Runs the connection until the member quits or the stream fails.
    ///
    /// Returns the name the member held, or `None` if the connection ended
    /// before a name was accepted.
    pub async fn run(self) -> Option<MemberName> {
        let Self {
            reader,
            writer,
            registry,
            activity,
            settings,
            connection_number,
        } = self;

        debug!(connection = connection_number, "New client connected");

        let (outbound, lines) = mpsc::channel(settings.outbound_buffer);
        let writer_task = tokio::spawn(write_lines(
            writer,
            lines,
            settings.write_timeout,
            connection_number,
        ));

        let mut session = Session {
            reader: BufReader::new(reader),
            outbound,
            registry,
            activity,
            max_line_bytes: settings.max_line_bytes,
            connection_number,
        };
        let name = session.drive().await;

        // Closing our sender lets the writer drain what is queued and exit.
        drop(session);
        if timeout(settings.write_timeout, writer_task).await.is_err() {
            debug!(
                connection = connection_number,
                "Writer did not finish before the grace period"
            );
        }

        name
    }
}

/// State shared by every phase of one connection.
struct Session<R> {
    reader: BufReader<R>,
    outbound: Outbound,
    registry: RegistryHandle,
    activity: ActivityLog,
    max_line_bytes: usize,
    connection_number: u64,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    async fn drive(&mut self) -> Option<MemberName> {
        let (name, first) = match self.negotiate().await {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(
                    connection = self.connection_number,
                    error = %e,
                    "Connection closed during name negotiation"
                );
                return None;
            }
        };

        info!(
            connection = self.connection_number,
            name = %name,
            coordinator = first,
            "Member joined"
        );

        if let Err(e) = self.serve(&name, first).await {
            debug!(name = %name, error = %e, "Connection ended");
        }

        self.teardown(&name).await;
        Some(name)
    }

    // ========================================================================
    // NEGOTIATING_NAME
    // ========================================================================

    async fn negotiate(&mut self) -> Result<(MemberName, bool), ConnectionError> {
        loop {
            self.send(ServerLine::submit_name()).await?;
            let candidate = self.read_line().await?;

            match self
                .registry
                .try_register(&candidate, self.outbound.clone())
                .await?
            {
                Registration::Accepted { name, first, .. } => return Ok((name, first)),
                Registration::Rejected(reason) => {
                    debug!(
                        connection = self.connection_number,
                        candidate = %candidate,
                        reason = %reason,
                        "Name rejected"
                    );
                }
            }
        }
    }

    // ========================================================================
    // ACTIVE
    // ========================================================================

    async fn serve(&mut self, name: &MemberName, first: bool) -> Result<(), ConnectionError> {
        self.announce_arrival(name, first).await?;

        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(ConnectionError::Eof) => {
                    debug!(name = %name, "Client sent EOF");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match ClientLine::parse(&line) {
                ClientLine::Quit => {
                    debug!(name = %name, "Client requested disconnect");
                    return Ok(());
                }
                ClientLine::Private(private) => self.send_private(name, private).await?,
                ClientLine::MalformedPrivate => self.wrong_command().await?,
                ClientLine::Chat(text) => self.chat(name, text).await?,
            }
        }
    }

    async fn announce_arrival(&mut self, name: &MemberName, first: bool) -> Result<(), ConnectionError> {
        let time = now_hhmm();

        self.registry
            .broadcast_except(
                vec![ServerLine::message(notice::joined(name, &time))],
                name.clone(),
            )
            .await?;
        self.activity.record(ActivityEvent::Joined {
            name: name.clone(),
            time: time.clone(),
        });

        if first {
            self.send(ServerLine::message(notice::first_member(&time)))
                .await?;
            self.send(ServerLine::coordinator(name.clone())).await?;
            self.activity.record(ActivityEvent::BecameCoordinator {
                name: name.clone(),
                time,
            });
        } else {
            self.registry.announce_roster(Vec::new()).await?;
        }

        Ok(())
    }

    async fn send_private(
        &mut self,
        name: &MemberName,
        private: PrivateMessage<'_>,
    ) -> Result<(), ConnectionError> {
        let Ok(target) = MemberName::parse(private.target) else {
            return self.wrong_command().await;
        };

        let time = now_hhmm();
        let line = ServerLine::message(notice::private_delivery(name, &time, private.body));

        match self.registry.send_private(target.as_str(), line).await? {
            Delivery::Delivered => {
                self.send(ServerLine::message(notice::private_echo(
                    &target,
                    &time,
                    private.body,
                )))
                .await?;
                self.activity.record(ActivityEvent::Private {
                    from: name.clone(),
                    to: target,
                    body: private.body.to_string(),
                    time,
                });
                Ok(())
            }
            Delivery::NoSuchTarget => {
                debug!(name = %name, target = %target, "Private message to unknown member");
                self.wrong_command().await
            }
        }
    }

    async fn wrong_command(&mut self) -> Result<(), ConnectionError> {
        self.send(ServerLine::message(notice::wrong_command(&now_hhmm())))
            .await
    }

    async fn chat(&mut self, name: &MemberName, text: &str) -> Result<(), ConnectionError> {
        let time = now_hhmm();

        let recipients = self
            .registry
            .broadcast(vec![ServerLine::message(notice::chat(name, &time, text))])
            .await?;
        debug!(name = %name, recipients, "Chat line broadcast");

        self.activity.record(ActivityEvent::Chat {
            name: name.clone(),
            time,
            text: text.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // TERMINATED
    // ========================================================================

    /// Releases the name and tells the remaining members. Never fails.
    async fn teardown(&mut self, name: &MemberName) {
        let time = now_hhmm();
        let departure = match self.registry.unregister(name.clone(), time.clone()).await {
            Ok(departure) => departure,
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to unregister member");
                return;
            }
        };

        let successor = match departure.change {
            CoordinatorChange::Changed(next) => next,
            CoordinatorChange::Unchanged => None,
        };

        info!(
            name = %name,
            successor = ?successor.as_ref().map(MemberName::as_str),
            remaining = departure.roster.len(),
            "Member left"
        );

        self.activity.record(ActivityEvent::Left {
            name: name.clone(),
            successor,
            time,
        });
    }

    // ========================================================================
    // Line I/O
    // ========================================================================

    /// Reads one line with its `\n` or `\r\n` terminator removed.
    ///
    /// Fails with `OutboundClosed` if the writer task stops while waiting.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let max = self.max_line_bytes;
        let mut buf = Vec::new();

        // Room for the content plus a `\r\n` terminator.
        let limit = (max as u64).saturating_add(2);
        let mut limited = (&mut self.reader).take(limit);

        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => {
                read.map_err(|e| ConnectionError::Io(e.to_string()))?
            }
            () = self.outbound.closed() => return Err(ConnectionError::OutboundClosed),
        };

        if read == 0 {
            return Err(ConnectionError::Eof);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > max {
            return Err(ConnectionError::MessageTooLarge { max });
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Queues a line for this member only.
    async fn send(&self, line: ServerLine) -> Result<(), ConnectionError> {
        self.outbound
            .send(line)
            .await
            .map_err(|_| ConnectionError::OutboundClosed)
    }
}

/// Drains the outbound queue onto the socket, then closes it.
///
/// Stops at the first failed or timed-out write; dropping the receiver is
/// what the session observes as `OutboundClosed`.
async fn write_lines<W>(
    writer: W,
    mut lines: mpsc::Receiver<ServerLine>,
    write_timeout: Duration,
    connection_number: u64,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    while let Some(line) = lines.recv().await {
        let encoded = line.encode();
        let result = timeout(write_timeout, async {
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = connection_number, error = %e, "Write failed");
                return;
            }
            Err(_) => {
                warn!(connection = connection_number, "Write timed out, dropping connection");
                return;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(connection = connection_number, error = %e, "Failed to close connection");
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Line exceeds {max} bytes")]
    MessageTooLarge { max: usize },

    #[error("Outbound queue closed")]
    OutboundClosed,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
