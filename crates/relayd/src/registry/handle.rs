//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use relay_core::{MemberName, Roster};
use relay_protocol::ServerLine;

use super::commands::{
    Delivery, Departure, Outbound, Registration, RegistryCommand, RegistryError, RejectReason,
};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry();
///
/// match registry.try_register("alice", outbound).await? {
///     Registration::Accepted { first, .. } => { /* announce */ }
///     Registration::Rejected(reason) => { /* ask again */ }
/// }
///
/// registry.broadcast(vec![ServerLine::message("hi")]).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and awaits the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Try to claim `candidate` for a new member.
    ///
    /// Invalid names are rejected here without contacting the actor.
    /// On acceptance the name and its route become visible to every other
    /// operation in the same step, and `NAMEACCEPTED` is queued on
    /// `outbound` ahead of anything else the member will receive.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_register(
        &self,
        candidate: &str,
        outbound: Outbound,
    ) -> Result<Registration, RegistryError> {
        let name = match MemberName::parse(candidate) {
            Ok(name) => name,
            Err(e) => return Ok(Registration::Rejected(RejectReason::Invalid(e))),
        };

        self.request(|respond_to| RegistryCommand::Register {
            name,
            outbound,
            respond_to,
        })
        .await
    }

    /// Remove a member, recompute the coordinator and announce the departure.
    ///
    /// If anyone remains, each of them is sent the departure notice stamped
    /// with `time`, then the new `COORDINATOR`/`MEMBERS` lines. No other
    /// command is processed in between.
    ///
    /// # Errors
    ///
    /// - `RegistryError::MemberNotFound` if the name is not registered
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(
        &self,
        name: MemberName,
        time: impl Into<String>,
    ) -> Result<Departure, RegistryError> {
        let time = time.into();
        self.request(|respond_to| RegistryCommand::Unregister {
            name,
            time,
            respond_to,
        })
        .await?
    }

    /// Deliver lines to every member. Returns the recipient count.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn broadcast(&self, lines: Vec<ServerLine>) -> Result<usize, RegistryError> {
        self.request(|respond_to| RegistryCommand::Broadcast {
            lines,
            exclude: None,
            respond_to,
        })
        .await
    }

    /// Deliver lines to every member except `exclude`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn broadcast_except(
        &self,
        lines: Vec<ServerLine>,
        exclude: MemberName,
    ) -> Result<usize, RegistryError> {
        self.request(|respond_to| RegistryCommand::Broadcast {
            lines,
            exclude: Some(exclude),
            respond_to,
        })
        .await
    }

    /// Deliver `preamble` plus the current `COORDINATOR`/`MEMBERS` lines
    /// to every member.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn announce_roster(&self, preamble: Vec<ServerLine>) -> Result<usize, RegistryError> {
        self.request(|respond_to| RegistryCommand::AnnounceRoster {
            preamble,
            respond_to,
        })
        .await
    }

    /// Deliver one line to the member named `target`.
    ///
    /// A target that is not a valid name cannot be registered and is
    /// reported as `NoSuchTarget` without contacting the actor.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn send_private(
        &self,
        target: &str,
        line: ServerLine,
    ) -> Result<Delivery, RegistryError> {
        let Ok(target) = MemberName::parse(target) else {
            return Ok(Delivery::NoSuchTarget);
        };

        self.request(|respond_to| RegistryCommand::SendPrivate {
            target,
            line,
            respond_to,
        })
        .await
    }

    /// Copy of the current membership and coordinator.
    ///
    /// Returns an empty roster if communication with the actor fails.
    pub async fn members(&self) -> Roster {
        self.request(|respond_to| RegistryCommand::Snapshot { respond_to })
            .await
            .unwrap_or_default()
    }
}
