//! Registry actor commands, outcomes, and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `Registration`, `Departure`, `Delivery`: Results of membership and routing operations
//! - `RegistryError`: Errors that can occur while talking to the actor
//!
//! All types are designed for async message passing and follow the panic-free policy.

use relay_core::{DomainError, MemberName, Roster};
use relay_protocol::ServerLine;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Capability to deliver lines to one connected member.
///
/// The receiving end is owned by the member's connection writer task; the
/// registry only ever holds clones of the sender.
pub type Outbound = mpsc::Sender<ServerLine>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response. The actor
/// processes commands one at a time, so every command is atomic with
/// respect to every other.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a name and attach its outbound handle.
    Register {
        /// Validated candidate name
        name: MemberName,
        /// Handle used to deliver lines to this member
        outbound: Outbound,
        /// Channel to send the result
        respond_to: oneshot::Sender<Registration>,
    },

    /// Release a name, recompute the coordinator and tell the remaining
    /// members.
    ///
    /// The departure notice and the `COORDINATOR`/`MEMBERS` lines are queued
    /// in the same step as the removal, so the successor named in the notice
    /// is always the one the roster lines announce.
    ///
    /// # Errors
    /// - `RegistryError::MemberNotFound` if the name is not registered
    Unregister {
        /// Name to remove
        name: MemberName,
        /// `HH:mm` stamp for the departure notice
        time: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<Departure, RegistryError>>,
    },

    /// Deliver lines to every member, optionally skipping one.
    ///
    /// Responds with the number of members the lines were queued for.
    Broadcast {
        /// Lines delivered in order to each recipient
        lines: Vec<ServerLine>,
        /// Member that must not receive the lines
        exclude: Option<MemberName>,
        /// Channel to send the recipient count
        respond_to: oneshot::Sender<usize>,
    },

    /// Deliver `preamble` followed by the current `COORDINATOR` and
    /// `MEMBERS` lines to every member.
    ///
    /// The roster lines are computed when the command is processed, so they
    /// describe the state every recipient is part of.
    AnnounceRoster {
        /// Lines sent before the roster lines
        preamble: Vec<ServerLine>,
        /// Channel to send the recipient count
        respond_to: oneshot::Sender<usize>,
    },

    /// Deliver one line to one member.
    SendPrivate {
        /// Recipient
        target: MemberName,
        /// Line to deliver
        line: ServerLine,
        /// Channel to send the result
        respond_to: oneshot::Sender<Delivery>,
    },

    /// Copy of the current membership and coordinator.
    Snapshot {
        /// Channel to send the roster
        respond_to: oneshot::Sender<Roster>,
    },
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a candidate name was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The name fails validation (empty, multi-line).
    Invalid(DomainError),

    /// Another member holds the name.
    Taken,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "{e}"),
            Self::Taken => write!(f, "name already taken"),
        }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The name is now claimed by the caller.
    Accepted {
        /// The claimed name
        name: MemberName,
        /// True if the registry was empty, making this member coordinator
        first: bool,
        /// Membership right after the registration
        roster: Roster,
    },

    /// The name was refused; the registry is unchanged.
    Rejected(RejectReason),
}

impl Registration {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// How the coordinator was affected by a departure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorChange {
    /// The departing member was coordinator. Holds the successor, or `None`
    /// if nobody is left.
    Changed(Option<MemberName>),

    /// The departing member was not coordinator.
    Unchanged,
}

/// Result of removing a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The removed name
    pub name: MemberName,
    /// Effect on the coordinator
    pub change: CoordinatorChange,
    /// Membership right after the removal
    pub roster: Roster,
}

/// Result of a private send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The line was queued for the target.
    Delivered,

    /// No member has that name. Nothing was sent.
    NoSuchTarget,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The requested member was not found.
    #[error("member not found: {0}")]
    MemberNotFound(MemberName),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
