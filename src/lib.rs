//! Cinder: a Redis-compatible in-memory key-value server.
//!
//! The server speaks the RESP wire protocol over TCP and runs as a
//! single-threaded, mio-based reactor: one thread multiplexes the
//! listening socket and every client connection, so the storage engine
//! needs no locking at all.
//!
//! # Architecture
//!
//! - mio event loop with edge-triggered readiness
//! - Incremental RESP parser that tolerates partial TCP segments
//! - Per-connection FIFO reply queue with partial-write resume
//! - String-only key space behind an extensible tagged value type

/// Configuration management for the server
pub mod config;

/// Error types and result aliases
pub mod error;

/// Network layer for connection management
pub mod network;

/// Redis protocol (RESP) implementation
pub mod protocol;

/// Core server implementation
pub mod server;

/// In-memory storage engine
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use server::{Server, ShutdownHandle};
