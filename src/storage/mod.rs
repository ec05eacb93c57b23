//! In-memory storage engine.

mod store;

pub use store::{Store, Value, ValueKind, WrongType};
