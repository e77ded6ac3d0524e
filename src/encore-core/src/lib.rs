pub mod backend;
pub mod config;
pub mod events;
pub mod logging;
pub mod models;
pub mod paths;

pub use backend::{
    Backend, BackendError, BackendResult, Library, LibraryStats, Mixer, Outputs, Playback,
    StoredPlaylists, Tracklist,
};
pub use config::{
    Config, ConfigError, LibraryConfig, LogLevel, LoggingConfig, ServerConfig, ValidationError,
};
pub use events::{CoreEvent, EventBus, EventListener};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{
    Output, PlaybackOptions, PlaybackState, Playlist, PlaylistInfo, SearchField, Tag, TlTrack,
    Track,
};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "encore";
pub const APP_AUTHOR: &str = "Encore";
pub const APP_QUALIFIER: &str = "io";
