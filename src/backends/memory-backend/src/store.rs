//! Stored playlists, optionally persisted as JSON.
//!
//! The on-disk file keeps a last-known-good backup. A corrupt file is moved
//! aside and the store falls back to the backup, or starts empty.

use encore_core::{
    BackendError, BackendResult, CoreEvent, EventBus, Playlist, PlaylistInfo, StoredPlaylists,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const PERSISTENCE_VERSION: u32 = 1;

/// Longest playlist the store accepts.
pub const MAX_PLAYLIST_LENGTH: usize = 16_384;

/// Refuse to read playlist files larger than this (32 MB).
const MAX_PLAYLIST_FILE_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PlaylistFileError {
    #[error("failed to create playlist directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write playlist file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read playlist file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("corrupt playlist file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("playlist format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("playlist file too large ({size} bytes, max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedPlaylists {
    version: u32,
    playlists: Vec<Playlist>,
}

/// Location of the playlist file and its backup.
#[derive(Debug, Clone)]
pub struct PlaylistFile {
    path: PathBuf,
    backup_path: PathBuf,
    corrupt_path: PathBuf,
}

impl PlaylistFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("playlists.json"),
            backup_path: dir.join("playlists.backup.json"),
            corrupt_path: dir.join("playlists.corrupt.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, playlists: &[Playlist]) -> Result<(), PlaylistFileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PlaylistFileError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, &self.backup_path) {
                tracing::warn!(error = %e, "failed to back up playlist file; continuing anyway");
            }
        }

        let persisted = PersistedPlaylists {
            version: PERSISTENCE_VERSION,
            playlists: playlists.to_vec(),
        };
        let file = fs::File::create(&self.path).map_err(|source| PlaylistFileError::Write {
            path: self.path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &persisted).map_err(|e| {
            PlaylistFileError::Write {
                path: self.path.clone(),
                source: io::Error::other(e),
            }
        })?;

        tracing::debug!(
            playlists = playlists.len(),
            path = %self.path.display(),
            "saved playlists to disk"
        );
        Ok(())
    }

    /// Loads stored playlists. Never fails on a bad file; see module docs.
    pub fn load(&self) -> Vec<Playlist> {
        if !self.path.exists() {
            return Vec::new();
        }

        match self.try_load(&self.path) {
            Ok(playlists) => playlists,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "playlist file is corrupt or unreadable"
                );
                if let Err(move_err) = fs::rename(&self.path, &self.corrupt_path) {
                    tracing::warn!(error = %move_err, "failed to preserve corrupt playlist file");
                }

                if self.backup_path.exists() {
                    match self.try_load(&self.backup_path) {
                        Ok(playlists) => {
                            tracing::info!(
                                playlists = playlists.len(),
                                "recovered playlists from backup"
                            );
                            return playlists;
                        }
                        Err(backup_err) => {
                            tracing::warn!(error = %backup_err, "backup also corrupt; starting fresh");
                        }
                    }
                }
                Vec::new()
            }
        }
    }

    fn try_load(&self, path: &Path) -> Result<Vec<Playlist>, PlaylistFileError> {
        let size = fs::metadata(path)
            .map_err(|source| PlaylistFileError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > MAX_PLAYLIST_FILE_SIZE {
            return Err(PlaylistFileError::FileTooLarge {
                size,
                max: MAX_PLAYLIST_FILE_SIZE,
            });
        }

        let file = fs::File::open(path).map_err(|source| PlaylistFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let persisted: PersistedPlaylists = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PlaylistFileError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if persisted.version != PERSISTENCE_VERSION {
            return Err(PlaylistFileError::UnsupportedVersion {
                found: persisted.version,
                expected: PERSISTENCE_VERSION,
            });
        }

        tracing::debug!(
            playlists = persisted.playlists.len(),
            path = %path.display(),
            "loaded playlists from disk"
        );
        Ok(persisted.playlists)
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// In-memory [`StoredPlaylists`], keyed by uri.
pub struct PlaylistStore {
    playlists: RwLock<BTreeMap<String, Playlist>>,
    file: Option<PlaylistFile>,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for PlaylistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistStore")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl PlaylistStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            playlists: RwLock::new(BTreeMap::new()),
            file: None,
            events,
        }
    }

    /// Store backed by `dir/playlists.json`, loaded immediately.
    pub fn persistent(dir: &Path, events: Arc<EventBus>) -> Self {
        let file = PlaylistFile::new(dir);
        let loaded: BTreeMap<String, Playlist> = file
            .load()
            .into_iter()
            .map(|playlist| (playlist.uri.clone(), playlist))
            .collect();
        let store = Self {
            playlists: RwLock::new(loaded),
            file: Some(file),
            events,
        };
        store.events.emit(CoreEvent::PlaylistsLoaded);
        store
    }

    /// Writes the current set to disk. A write failure is logged, not
    /// surfaced, so clients keep the in-memory change.
    fn flush(&self, playlists: &BTreeMap<String, Playlist>) {
        if let Some(file) = &self.file {
            let all: Vec<Playlist> = playlists.values().cloned().collect();
            if let Err(e) = file.save(&all) {
                tracing::error!(error = %e, "failed to persist playlists");
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Playlist>> {
        self.playlists.write().expect("playlist store poisoned")
    }
}

impl StoredPlaylists for PlaylistStore {
    fn list(&self) -> Vec<PlaylistInfo> {
        self.playlists
            .read()
            .expect("playlist store poisoned")
            .values()
            .map(Playlist::info)
            .collect()
    }

    fn lookup(&self, uri: &str) -> Option<Playlist> {
        self.playlists
            .read()
            .expect("playlist store poisoned")
            .get(uri)
            .cloned()
    }

    fn create(&self, name: &str, scheme: &str) -> BackendResult<Playlist> {
        let uri = format!("{scheme}:{name}");
        let playlist = {
            let mut playlists = self.write();
            if playlists.contains_key(&uri) {
                return Err(BackendError::AlreadyExists {
                    entity: format!("playlist {name}"),
                });
            }
            let playlist = Playlist {
                uri: uri.clone(),
                name: name.to_string(),
                tracks: Vec::new(),
                last_modified: Some(now()),
            };
            playlists.insert(uri.clone(), playlist.clone());
            self.flush(&playlists);
            playlist
        };
        self.events.emit(CoreEvent::PlaylistChanged { uri });
        Ok(playlist)
    }

    fn save(&self, mut playlist: Playlist) -> BackendResult<Playlist> {
        if playlist.tracks.len() > MAX_PLAYLIST_LENGTH {
            return Err(BackendError::AtCapacity {
                message: "Stored playlist is too large".into(),
            });
        }
        let uri = playlist.uri.clone();
        {
            let mut playlists = self.write();
            if !playlists.contains_key(&uri) {
                return Err(BackendError::not_found(format!("playlist {uri}")));
            }
            playlist.last_modified = Some(now());
            playlists.insert(uri.clone(), playlist.clone());
            self.flush(&playlists);
        }
        self.events.emit(CoreEvent::PlaylistChanged { uri });
        Ok(playlist)
    }

    fn delete(&self, uri: &str) -> BackendResult<()> {
        {
            let mut playlists = self.write();
            if playlists.remove(uri).is_none() {
                return Err(BackendError::not_found(format!("playlist {uri}")));
            }
            self.flush(&playlists);
        }
        self.events.emit(CoreEvent::PlaylistDeleted {
            uri: uri.to_string(),
        });
        Ok(())
    }
}
