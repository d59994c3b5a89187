//! Relay Protocol - Line-oriented wire protocol
//!
//! This crate provides the pure codec for the chat relay. It encodes the
//! fixed set of server commands into text lines and classifies lines
//! submitted by clients. Nothing here performs I/O.

pub mod error;
pub mod message;
pub mod notice;
pub mod parse;

pub use error::ProtocolError;
pub use message::ServerLine;
pub use parse::{parse_private_target, parse_quit, ClientLine, PrivateMessage};
