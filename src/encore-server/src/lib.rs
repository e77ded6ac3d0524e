//! Async front end for the encore protocol engine: listener, per-connection
//! session loop and the idle/notify hub.

pub mod bridge;
pub mod error;
pub mod hub;
pub mod listener;
pub mod session;

pub use bridge::EventBridge;
pub use error::ServerError;
pub use hub::{Changes, IdleHub, Subscription};
pub use listener::{ListenAddr, Server, ServerSettings};
pub use session::{serve, Hangup, Shared};
