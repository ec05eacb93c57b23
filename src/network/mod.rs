//! Network layer: per-connection protocol state.

mod connection;

pub use connection::Connection;
