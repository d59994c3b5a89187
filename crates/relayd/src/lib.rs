//! Relay Daemon - Session registry and chat server
//!
//! This crate provides the core infrastructure for the chat relay:
//! - `registry` - Session registry actor: names, routes and the coordinator
//! - `server` - TCP server and per-connection handlers
//! - `activity` - Append-only activity log
//! - `config` - Layered daemon configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relayd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │     │     RegistryActor           │   │
//! │  │  (TcpListener)  │     │  (membership state owner)   │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             ▲                   │
//! │           │ connections                 │ commands          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐                    │                   │
//! │  │ConnectionHandler│────────────────────┘                   │
//! │  │  (per client)   │────▶ ActivityLog                       │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod activity;
pub mod config;
pub mod registry;
pub mod server;
