//! Session registry using Actor pattern.
//!
//! The registry is the single source of truth for membership: which names
//! are claimed, where each member's lines go, and who the coordinator is.
//! It receives commands via a tokio mpsc channel and processes them one at
//! a time, so joins and leaves are totally ordered and no reader ever sees
//! a half-applied change.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler │────▶│  RegistryActor  │────▶│ Outbound queues  │
//! └──────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │  BTreeMap<MemberName, │  try_send, one
//!         │   (mpsc channel)      │  Outbound> + coord.   │  queue per member
//!         ▼                       ▼                       ▼
//!   register/unregister     linearizable state      connection writer
//!   broadcast/private                                tasks drain queues
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    CoordinatorChange, Delivery, Departure, Outbound, Registration, RegistryCommand,
    RegistryError, RejectReason,
};
pub use handle::RegistryHandle;

/// Channel buffer size for registry commands
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     let roster = handle.members().await;
///     assert!(roster.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
