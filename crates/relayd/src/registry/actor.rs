//! Registry actor - owns all membership state and processes commands.
//!
//! The RegistryActor is the single owner of membership state in the system.
//! It receives commands via an mpsc channel and answers on oneshot channels.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use relay_core::{MemberName, Roster};
use relay_protocol::{notice, ServerLine};

use super::commands::{
    CoordinatorChange, Delivery, Departure, Outbound, Registration, RegistryCommand,
    RegistryError, RejectReason,
};

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all membership state.
///
/// # Ownership
///
/// The actor owns:
/// - `routes`: name → outbound handle. Its key set *is* the set of active
///   names, so a name can never exist without a route or the reverse.
/// - `coordinator`: the distinguished member, `None` only when `routes` is
///   empty.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially,
/// which makes every operation linearizable. Delivery uses `try_send` on
/// bounded per-member queues, so a slow recipient never stalls the actor.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Active members and their outbound handles, ordered by name.
    routes: BTreeMap<MemberName, Outbound>,

    /// Current coordinator.
    coordinator: Option<MemberName>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            routes: BTreeMap::new(),
            coordinator: None,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.routes.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                name,
                outbound,
                respond_to,
            } => {
                let result = self.handle_register(name, outbound);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister {
                name,
                time,
                respond_to,
            } => {
                let result = self.handle_unregister(name, &time);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Broadcast {
                lines,
                exclude,
                respond_to,
            } => {
                let recipients = self.deliver_to_all(&lines, exclude.as_ref());
                let _ = respond_to.send(recipients);
            }
            RegistryCommand::AnnounceRoster {
                mut preamble,
                respond_to,
            } => {
                preamble.extend(ServerLine::roster_update(&self.roster()));
                let recipients = self.deliver_to_all(&preamble, None);
                let _ = respond_to.send(recipients);
            }
            RegistryCommand::SendPrivate {
                target,
                line,
                respond_to,
            } => {
                let result = self.handle_send_private(&target, line);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.roster());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, name: MemberName, outbound: Outbound) -> Registration {
        if self.routes.contains_key(&name) {
            debug!(name = %name, "Name already taken, rejecting registration");
            return Registration::Rejected(RejectReason::Taken);
        }

        let first = self.coordinator.is_none();
        if first {
            self.coordinator = Some(name.clone());
        }
        // Queued before the route exists, so it precedes any broadcast.
        deliver(&name, &outbound, ServerLine::name_accepted(name.clone()));
        self.routes.insert(name.clone(), outbound);

        info!(
            name = %name,
            coordinator = first,
            total_members = self.routes.len(),
            "Member registered"
        );

        Registration::Accepted {
            name,
            first,
            roster: self.roster(),
        }
    }

    fn handle_unregister(
        &mut self,
        name: MemberName,
        time: &str,
    ) -> Result<Departure, RegistryError> {
        if self.routes.remove(&name).is_none() {
            debug!(name = %name, "Unregister for unknown member");
            return Err(RegistryError::MemberNotFound(name));
        }

        let change = if self.coordinator.as_ref() == Some(&name) {
            // Smallest remaining name, picked once.
            self.coordinator = self.routes.keys().next().cloned();
            CoordinatorChange::Changed(self.coordinator.clone())
        } else {
            CoordinatorChange::Unchanged
        };

        info!(
            name = %name,
            coordinator = ?self.coordinator.as_ref().map(MemberName::as_str),
            total_members = self.routes.len(),
            "Member unregistered"
        );

        let roster = self.roster();
        if !roster.is_empty() {
            let text = match &change {
                CoordinatorChange::Changed(Some(next)) => {
                    notice::left_new_coordinator(&name, next, time)
                }
                _ => notice::left(&name, time),
            };
            let mut lines = vec![ServerLine::message(text)];
            lines.extend(ServerLine::roster_update(&roster));
            self.deliver_to_all(&lines, None);
        }

        Ok(Departure {
            name,
            change,
            roster,
        })
    }

    fn handle_send_private(&self, target: &MemberName, line: ServerLine) -> Delivery {
        match self.routes.get(target) {
            Some(outbound) => {
                deliver(target, outbound, line);
                Delivery::Delivered
            }
            None => {
                debug!(target = %target, "Private message to unknown member");
                Delivery::NoSuchTarget
            }
        }
    }

    /// Queues `lines` for every member except `exclude`.
    fn deliver_to_all(&self, lines: &[ServerLine], exclude: Option<&MemberName>) -> usize {
        let mut recipients = 0;
        for (name, outbound) in &self.routes {
            if exclude == Some(name) {
                continue;
            }
            for line in lines {
                deliver(name, outbound, line.clone());
            }
            recipients += 1;
        }
        recipients
    }

    fn roster(&self) -> Roster {
        Roster::new(self.coordinator.clone(), self.routes.keys().cloned())
    }

    /// Returns the number of registered members (for testing).
    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        match &self.coordinator {
            Some(c) => assert!(self.routes.contains_key(c), "coordinator {c} not a member"),
            None => assert!(self.routes.is_empty(), "members without a coordinator"),
        }
    }
}

/// Best-effort, non-blocking delivery of one line.
///
/// A full queue drops the line for that recipient only; a closed queue
/// means the member is disconnecting and will unregister shortly.
///
/// A member whose queue overflows stays connected. Any dropped lines are
/// lost for good, including `COORDINATOR`/`MEMBERS` updates, so its view of
/// the roster can stay stale until the next membership change reaches it.
fn deliver(name: &MemberName, outbound: &Outbound, line: ServerLine) {
    match outbound.try_send(line) {
        Ok(()) => {}
        Err(TrySendError::Full(line)) => {
            warn!(name = %name, line = %line, "Outbound queue full, dropping line");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(name = %name, "Outbound queue closed, skipping");
        }
    }
}
