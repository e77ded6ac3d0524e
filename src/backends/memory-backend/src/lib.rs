//! In-memory backend for the encore protocol engine.
//!
//! Every component shares one [`EventBus`], so a server subscribed to it sees
//! every change regardless of which command caused it. Playback is simulated;
//! nothing is decoded or played.

pub mod deck;
pub mod devices;
pub mod library;
pub mod manifest;
pub mod queue;
pub mod store;

pub use deck::Deck;
pub use devices::{OutputBank, SoftMixer};
pub use library::{Artwork, MemoryLibrary};
pub use manifest::{load_manifest, ManifestEntry, ManifestError};
pub use store::{PlaylistFile, PlaylistFileError, PlaylistStore};

use encore_core::{Backend, EventBus, LibraryConfig, Track};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_VOLUME: u8 = 100;
pub const DEFAULT_OUTPUT_NAME: &str = "Default output";

#[derive(Debug, Error)]
pub enum MemoryBackendError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

#[derive(Debug)]
pub struct MemoryBackendBuilder {
    tracks: Vec<ManifestEntry>,
    art: HashMap<String, Artwork>,
    manifest: Option<PathBuf>,
    playlists_dir: Option<PathBuf>,
    volume: Option<u8>,
    outputs: Vec<String>,
    events: Option<Arc<EventBus>>,
}

impl Default for MemoryBackendBuilder {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            art: HashMap::new(),
            manifest: None,
            playlists_dir: None,
            volume: Some(DEFAULT_VOLUME),
            outputs: vec![DEFAULT_OUTPUT_NAME.to_string()],
            events: None,
        }
    }
}

impl MemoryBackendBuilder {
    pub fn tracks(mut self, tracks: impl IntoIterator<Item = Track>) -> Self {
        self.tracks.extend(
            tracks
                .into_iter()
                .map(|track| ManifestEntry { track, art: None }),
        );
        self
    }

    /// Cover art served for `uri`, kept across rescans.
    pub fn image(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.art.insert(uri.into(), Artwork::Bytes(Arc::new(bytes)));
        self
    }

    /// Loads tracks from a JSON manifest at build time and on every rescan.
    pub fn manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest = Some(path.into());
        self
    }

    /// Persists stored playlists under `dir`. Without it they live in memory.
    pub fn playlists_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.playlists_dir = Some(dir.into());
        self
    }

    /// Starting volume; `None` builds a backend without a mixer.
    pub fn volume(mut self, volume: Option<u8>) -> Self {
        self.volume = volume;
        self
    }

    pub fn outputs(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Applies the `[library]` section of the config file.
    pub fn library_config(mut self, config: &LibraryConfig) -> Self {
        if let Some(manifest) = &config.manifest {
            self.manifest = Some(manifest.clone());
        }
        if let Some(dir) = &config.playlists_dir {
            self.playlists_dir = Some(dir.clone());
        }
        self
    }

    pub fn build(self) -> Result<Backend, MemoryBackendError> {
        let events = self.events.unwrap_or_default();

        let mut entries = self.tracks;
        if let Some(path) = &self.manifest {
            entries.extend(load_manifest(path)?);
        }
        tracing::info!(
            tracks = entries.len(),
            manifest = ?self.manifest,
            "building in-memory backend"
        );

        let deck = Arc::new(Deck::new(events.clone()));
        let library = MemoryLibrary::new(entries, self.art, self.manifest, events.clone());
        let playlists = match &self.playlists_dir {
            Some(dir) => PlaylistStore::persistent(dir, events.clone()),
            None => PlaylistStore::new(events.clone()),
        };

        Ok(Backend {
            playback: deck.clone(),
            tracklist: deck,
            library: Arc::new(library),
            playlists: Arc::new(playlists),
            mixer: Arc::new(SoftMixer::new(self.volume, events.clone())),
            outputs: Arc::new(OutputBank::new(&self.outputs, events.clone())),
            events,
        })
    }
}

/// Entry point: `MemoryBackend::builder().tracks(..).build()`.
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn builder() -> MemoryBackendBuilder {
        MemoryBackendBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::{CoreEvent, EventListener};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CoreEvent>>);

    impl EventListener for Recorder {
        fn on_event(&self, event: &CoreEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn components_share_one_bus() {
        let backend = MemoryBackend::builder()
            .tracks([Track::new("local:a")])
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        backend.events.subscribe(recorder.clone());

        backend.tracklist.add(vec![Track::new("local:a")], None).unwrap();
        backend.mixer.set_volume(40).unwrap();
        backend.playback.play(None).unwrap();

        let events = recorder.0.lock().unwrap();
        assert!(events.contains(&CoreEvent::TracklistChanged));
        assert!(events.contains(&CoreEvent::VolumeChanged { volume: 40 }));
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::PlaybackStateChanged { .. })));
    }

    #[test]
    fn manifest_tracks_join_inline_tracks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, r#"{"version":1,"tracks":[{"uri":"local:b"}]}"#).unwrap();

        let backend = MemoryBackend::builder()
            .tracks([Track::new("local:a")])
            .manifest(&path)
            .build()
            .unwrap();
        assert_eq!(backend.library.stats().songs, 2);
    }

    #[test]
    fn missing_manifest_fails_the_build() {
        let err = MemoryBackend::builder()
            .manifest("/definitely/not/here.json")
            .build()
            .err().unwrap();
        assert!(matches!(err, MemoryBackendError::Manifest(_)));
    }

    #[test]
    fn playback_and_tracklist_are_the_same_deck() {
        let backend = MemoryBackend::builder().build().unwrap();
        let added = backend
            .tracklist
            .add(vec![Track::new("local:x")], None)
            .unwrap();
        backend.playback.play(Some(added[0].tlid)).unwrap();
        assert_eq!(backend.playback.current().unwrap().tlid, added[0].tlid);
    }
}
