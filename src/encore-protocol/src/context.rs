use crate::board::MessageBoard;
use crate::registry::Registry;
use crate::session::SessionState;
use crate::subsystem::Subsystem;
use crate::uri_map::UriMapper;
use encore_core::{Backend, ServerConfig};
use std::time::Instant;

/// Wakes idling clients. Implemented by the server's idle hub.
pub trait Notifier: Send + Sync {
    fn notify(&self, subsystem: Subsystem);
}

/// Protocol-level slice of the server configuration.
#[derive(Debug, Clone, Default)]
pub struct ProtocolSettings {
    pub password: Option<String>,
    /// Commands removed from the registry at startup.
    pub command_blacklist: Vec<String>,
    /// Scheme for playlists created by `save` and `playlistadd`.
    pub default_playlist_scheme: String,
}

impl From<&ServerConfig> for ProtocolSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            password: config.password.clone().filter(|p| !p.is_empty()),
            command_blacklist: config.command_blacklist.clone(),
            default_playlist_scheme: config.default_playlist_scheme.clone(),
        }
    }
}

/// Everything a command handler may touch while it runs.
pub struct Context<'a> {
    pub backend: &'a Backend,
    pub session: &'a mut SessionState,
    pub settings: &'a ProtocolSettings,
    pub registry: &'a Registry,
    pub uri_map: &'a UriMapper,
    pub board: &'a MessageBoard,
    pub notifier: &'a dyn Notifier,
    pub started: Instant,
}
