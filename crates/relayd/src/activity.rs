//! Append-only activity log.
//!
//! Chat activity (joins, leaves, messages) is appended to a plain text file
//! by a dedicated writer task. Callers hold a cheap-to-clone
//! [`ActivityLog`] and enqueue events without waiting; a failing or slow
//! sink never affects the chat flow.
//!
//! ```text
//! ConnectionHandler ──append()──▶ mpsc ──▶ ActivityWriter ──▶ activity.log
//! ```

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use relay_core::{banner_stamp, MemberName};

/// Pending events before new ones are dropped.
const LOG_BUFFER: usize = 1024;

/// Width of the separator written when the server starts.
const BANNER_WIDTH: usize = 120;

enum LogCommand {
    Append(String),
    Flush(oneshot::Sender<()>),
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    Joined { name: MemberName, time: String },
    BecameCoordinator { name: MemberName, time: String },
    Chat { name: MemberName, time: String, text: String },
    Private { from: MemberName, to: MemberName, body: String, time: String },
    Left { name: MemberName, successor: Option<MemberName>, time: String },
}

impl std::fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Joined { name, time } => write!(f, "{name} joined ({time})"),
            Self::BecameCoordinator { name, time } => write!(f, "{name} is coordinator ({time})"),
            Self::Chat { name, time, text } => write!(f, "{name}({time}): {text}"),
            Self::Private { from, to, body, time } => {
                write!(f, "(private): {from} -> {to}: {body}({time})")
            }
            Self::Left { name, successor: Some(next), time } => {
                write!(f, "{name} disconnected. {next} is coordinator ({time})")
            }
            Self::Left { name, successor: None, time } => {
                write!(f, "{name} disconnected ({time})")
            }
        }
    }
}

/// Fire-and-forget handle to the activity log.
#[derive(Clone)]
pub struct ActivityLog {
    sender: Option<mpsc::Sender<LogCommand>>,
}

impl ActivityLog {
    /// A log that accepts and discards every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Opens `path` for appending, writes the server start banner and
    /// spawns the writer task.
    ///
    /// # Errors
    ///
    /// Returns `ActivityLogError::Open` if the file or its parent directory
    /// cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ActivityLogError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ActivityLogError::open(&path, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ActivityLogError::open(&path, e))?;

        let (tx, rx) = mpsc::channel(LOG_BUFFER);
        let writer = ActivityWriter {
            path: path.clone(),
            file: BufWriter::new(file),
            receiver: rx,
        };
        tokio::spawn(writer.run());

        info!(path = %path.display(), "Activity log opened");

        let log = Self { sender: Some(tx) };
        log.append(start_banner());
        Ok(log)
    }

    /// Enqueues one event. Never blocks and never fails.
    pub fn append(&self, event: impl Into<String>) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(LogCommand::Append(event.into())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Activity log queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Activity log writer stopped, dropping event");
            }
        }
    }

    /// Enqueues a typed event.
    pub fn record(&self, event: ActivityEvent) {
        self.append(event.to_string());
    }

    /// Waits until every event appended before this call has been written.
    pub async fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        if sender.send(LogCommand::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Separator written once per server start.
fn start_banner() -> String {
    format!(
        "\n{}\nSERVER START: {}\n",
        "-".repeat(BANNER_WIDTH),
        banner_stamp(&Local::now())
    )
}

/// Owns the file and applies queued commands in order.
struct ActivityWriter {
    path: PathBuf,
    file: BufWriter<File>,
    receiver: mpsc::Receiver<LogCommand>,
}

impl ActivityWriter {
    async fn run(mut self) {
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LogCommand::Append(event) => {
                    if let Err(e) = self.write_event(&event).await {
                        warn!(
                            path = %self.path.display(),
                            error = %e,
                            "Failed to append activity event"
                        );
                    }
                }
                LogCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        debug!(path = %self.path.display(), "Activity log writer stopped");
    }

    async fn write_event(&mut self, event: &str) -> std::io::Result<()> {
        self.file.write_all(event.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await
    }
}

/// Errors that can occur while setting up the activity log.
#[derive(Debug, thiserror::Error)]
pub enum ActivityLogError {
    #[error("Failed to open activity log at {path}: {error}")]
    Open { path: PathBuf, error: String },
}

impl ActivityLogError {
    fn open(path: &Path, error: std::io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }
}
