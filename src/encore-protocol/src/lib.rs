//! The line protocol engine: tokenizing requests, resolving them against the
//! command registry, running handlers against the backend and framing replies.
//!
//! Everything here is synchronous. Sockets, timeouts and idle waits belong to
//! `encore-server`.

pub mod ack;
pub mod args;
pub mod board;
mod commands;
pub mod context;
pub mod dispatcher;
pub mod filter;
pub mod format;
pub mod registry;
pub mod response;
pub mod session;
pub mod subsystem;
pub mod tokenize;
pub mod uri_map;

pub use ack::{AckCode, AckError};
pub use context::{Notifier, ProtocolSettings};
pub use dispatcher::{Dispatcher, Outcome};
pub use registry::{CommandSpec, Registry};
pub use response::{encode, Frame, Response};
pub use session::{SessionId, SessionState};
pub use subsystem::Subsystem;

/// Protocol version announced in the greeting line.
pub const PROTOCOL_VERSION: &str = "0.21.0";
