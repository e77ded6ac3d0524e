use crate::events::EventBus;
use crate::models::{
    Output, PlaybackOptions, PlaybackState, Playlist, PlaylistInfo, SearchField, Tag, TlTrack,
    Track,
};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Failure categories a backend can report. The protocol layer maps each one
/// to a distinct client-visible error code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },
    #[error("{message}")]
    AtCapacity { message: String },
    #[error("{message}")]
    LoadFailed { message: String },
    #[error("already updating")]
    UpdateInProgress,
    #[error("{message}")]
    SyncConflict { message: String },
    #[error("{message}")]
    InvalidArgument { message: String },
    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
    #[error("{message}")]
    Other { message: String },
}

impl BackendError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        BackendError::NotFound {
            entity: entity.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        BackendError::Other {
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Transport control over whatever is currently queued.
pub trait Playback: Send + Sync {
    fn state(&self) -> PlaybackState;

    fn current(&self) -> Option<TlTrack>;

    fn time_position_ms(&self) -> u64;

    /// Starts the given queue entry, or resumes/starts the current one when `None`.
    fn play(&self, tlid: Option<u32>) -> BackendResult<()>;

    fn pause(&self) -> BackendResult<()>;

    fn resume(&self) -> BackendResult<()>;

    fn stop(&self) -> BackendResult<()>;

    fn next(&self) -> BackendResult<()>;

    fn previous(&self) -> BackendResult<()>;

    /// Seeks within the current track.
    fn seek(&self, position_ms: u64) -> BackendResult<()>;
}

/// The play queue.
pub trait Tracklist: Send + Sync {
    fn tracks(&self) -> Vec<TlTrack>;

    fn length(&self) -> usize {
        self.tracks().len()
    }

    /// Monotonic counter bumped on every queue change.
    fn version(&self) -> u32;

    fn index_of(&self, tlid: u32) -> Option<usize> {
        self.tracks().iter().position(|t| t.tlid == tlid)
    }

    /// Queue entry that will play after the current one.
    fn next_tlid(&self) -> Option<u32>;

    /// Inserts at `at`, or appends when `None`.
    fn add(&self, tracks: Vec<Track>, at: Option<usize>) -> BackendResult<Vec<TlTrack>>;

    fn remove(&self, tlids: &[u32]) -> BackendResult<Vec<TlTrack>>;

    fn clear(&self) -> BackendResult<()>;

    /// Moves the entries in `range` so the first lands at `to`.
    fn move_range(&self, range: Range<usize>, to: usize) -> BackendResult<()>;

    fn swap(&self, a: usize, b: usize) -> BackendResult<()>;

    fn shuffle(&self, range: Option<Range<usize>>) -> BackendResult<()>;

    fn options(&self) -> PlaybackOptions;

    fn set_options(&self, options: PlaybackOptions) -> BackendResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryStats {
    pub artists: usize,
    pub albums: usize,
    pub songs: usize,
    /// Sum of track lengths, in seconds.
    pub db_playtime: u64,
    /// Unix time of the last completed update.
    pub db_update: i64,
}

/// Read access to the music library.
pub trait Library: Send + Sync {
    /// Tracks at `uri`. A directory-like uri yields every track below it.
    fn lookup(&self, uri: &str) -> BackendResult<Vec<Track>>;

    fn search(&self, query: &[(SearchField, String)], exact: bool) -> BackendResult<Vec<Track>>;

    /// Distinct values of `tag` among tracks matching `query`, sorted.
    fn distinct(&self, tag: Tag, query: &[(SearchField, String)]) -> BackendResult<Vec<String>>;

    /// Cover art for a track, if any.
    fn image(&self, uri: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Starts a rescan and returns its job id.
    fn refresh(&self, uri: Option<&str>) -> BackendResult<u32>;

    fn stats(&self) -> LibraryStats;

    fn uri_schemes(&self) -> Vec<String>;
}

pub trait StoredPlaylists: Send + Sync {
    fn list(&self) -> Vec<PlaylistInfo>;

    fn lookup(&self, uri: &str) -> Option<Playlist>;

    /// Creates an empty playlist using the given uri scheme.
    fn create(&self, name: &str, scheme: &str) -> BackendResult<Playlist>;

    /// Replaces the stored contents of `playlist.uri`.
    fn save(&self, playlist: Playlist) -> BackendResult<Playlist>;

    fn delete(&self, uri: &str) -> BackendResult<()>;
}

pub trait Mixer: Send + Sync {
    /// Volume 0-100, or `None` when no mixer is available.
    fn volume(&self) -> Option<u8>;

    fn set_volume(&self, volume: u8) -> BackendResult<()>;
}

pub trait Outputs: Send + Sync {
    fn list(&self) -> Vec<Output>;

    fn set_enabled(&self, id: u32, enabled: bool) -> BackendResult<()>;
}

/// Everything a protocol session can reach.
#[derive(Clone)]
pub struct Backend {
    pub playback: Arc<dyn Playback>,
    pub tracklist: Arc<dyn Tracklist>,
    pub library: Arc<dyn Library>,
    pub playlists: Arc<dyn StoredPlaylists>,
    pub mixer: Arc<dyn Mixer>,
    pub outputs: Arc<dyn Outputs>,
    pub events: Arc<EventBus>,
}
