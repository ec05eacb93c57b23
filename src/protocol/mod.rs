//! RESP wire protocol: request parsing, reply serialization, and
//! command dispatch.

pub mod command;
pub mod resp;

pub use command::dispatch;
pub use resp::{parse_command, CommandArgs, ParseError, Reply, RequestParser};
