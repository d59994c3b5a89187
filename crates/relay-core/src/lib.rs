//! Relay Core - Shared domain types for the chat relay
//!
//! This crate provides the domain types shared between the protocol
//! codec (`relay-protocol`) and the daemon (`relayd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod clock;
pub mod error;
pub mod member;

// Re-exports for convenience
pub use clock::{banner_stamp, hhmm, now_hhmm};
pub use error::{DomainError, DomainResult};
pub use member::{MemberName, Roster};
