use crate::manifest::{load_manifest, ManifestEntry};
use encore_core::{
    BackendError, BackendResult, CoreEvent, EventBus, Library, LibraryStats, SearchField, Tag,
    Track,
};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where a track's cover art comes from.
#[derive(Debug, Clone)]
pub enum Artwork {
    Bytes(Arc<Vec<u8>>),
    File(PathBuf),
}

#[derive(Debug, Default)]
struct Catalog {
    tracks: Vec<Track>,
    art: HashMap<String, Artwork>,
    updated_at: i64,
}

impl Catalog {
    fn from_entries(entries: Vec<ManifestEntry>, extra_art: &HashMap<String, Artwork>) -> Self {
        let mut art = extra_art.clone();
        let tracks = entries
            .into_iter()
            .map(|entry| {
                if let Some(path) = entry.art {
                    art.insert(entry.track.uri.clone(), Artwork::File(path));
                }
                entry.track
            })
            .collect();
        Self {
            tracks,
            art,
            updated_at: now(),
        }
    }

    fn matching<'a>(
        &'a self,
        query: &'a [(SearchField, String)],
        exact: bool,
    ) -> impl Iterator<Item = &'a Track> + 'a {
        self.tracks.iter().filter(move |track| {
            query
                .iter()
                .all(|(field, needle)| field.matches(track, needle, exact))
        })
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

struct LibraryInner {
    catalog: RwLock<Catalog>,
    /// Art registered in code; survives rescans.
    pinned_art: HashMap<String, Artwork>,
    manifest: Option<PathBuf>,
    updating: AtomicBool,
    next_job: AtomicU32,
    events: Arc<EventBus>,
}

impl LibraryInner {
    /// Reloads the manifest and publishes the result. Runs on the update thread.
    fn rescan(&self, manifest: &Path) {
        match load_manifest(manifest) {
            Ok(entries) => {
                let catalog = Catalog::from_entries(entries, &self.pinned_art);
                let songs = catalog.tracks.len();
                *self.catalog.write().expect("library catalog poisoned") = catalog;
                tracing::info!(songs, path = %manifest.display(), "library rescan finished");
                self.events.emit(CoreEvent::LibraryChanged);
            }
            Err(e) => {
                tracing::warn!(error = %e, "library rescan failed; keeping previous catalog");
            }
        }
        self.finish();
    }

    fn finish(&self) {
        self.updating.store(false, Ordering::SeqCst);
        self.events.emit(CoreEvent::UpdateFinished);
    }
}

/// In-memory [`Library`]. Cloning shares the catalog.
#[derive(Clone)]
pub struct MemoryLibrary {
    inner: Arc<LibraryInner>,
}

impl std::fmt::Debug for MemoryLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLibrary")
            .field("manifest", &self.inner.manifest)
            .finish_non_exhaustive()
    }
}

impl MemoryLibrary {
    pub(crate) fn new(
        entries: Vec<ManifestEntry>,
        pinned_art: HashMap<String, Artwork>,
        manifest: Option<PathBuf>,
        events: Arc<EventBus>,
    ) -> Self {
        let catalog = Catalog::from_entries(entries, &pinned_art);
        Self {
            inner: Arc::new(LibraryInner {
                catalog: RwLock::new(catalog),
                pinned_art,
                manifest,
                updating: AtomicBool::new(false),
                next_job: AtomicU32::new(1),
                events,
            }),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.inner.updating.load(Ordering::SeqCst)
    }

    fn catalog(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.inner.catalog.read().expect("library catalog poisoned")
    }
}

impl Library for MemoryLibrary {
    fn lookup(&self, uri: &str) -> BackendResult<Vec<Track>> {
        let catalog = self.catalog();
        let uri = uri.trim_end_matches('/');
        if uri.is_empty() {
            return Ok(catalog.tracks.clone());
        }
        if let Some(track) = catalog.tracks.iter().find(|t| t.uri == uri) {
            return Ok(vec![track.clone()]);
        }
        let prefix = format!("{uri}/");
        Ok(catalog
            .tracks
            .iter()
            .filter(|t| t.uri.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn search(&self, query: &[(SearchField, String)], exact: bool) -> BackendResult<Vec<Track>> {
        Ok(self.catalog().matching(query, exact).cloned().collect())
    }

    fn distinct(&self, tag: Tag, query: &[(SearchField, String)]) -> BackendResult<Vec<String>> {
        let values: BTreeSet<String> = self
            .catalog()
            .matching(query, true)
            .filter_map(|track| track.tag(tag))
            .collect();
        Ok(values.into_iter().collect())
    }

    fn image(&self, uri: &str) -> BackendResult<Option<Vec<u8>>> {
        let artwork = {
            let catalog = self.catalog();
            if !catalog.tracks.iter().any(|t| t.uri == uri) {
                return Err(BackendError::not_found(format!("track {uri}")));
            }
            catalog.art.get(uri).cloned()
        };
        match artwork {
            None => Ok(None),
            Some(Artwork::Bytes(bytes)) => Ok(Some(bytes.as_ref().clone())),
            Some(Artwork::File(path)) => match fs::read(&path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "cover art unreadable");
                    Ok(None)
                }
            },
        }
    }

    fn refresh(&self, uri: Option<&str>) -> BackendResult<u32> {
        if self.inner.updating.swap(true, Ordering::SeqCst) {
            return Err(BackendError::UpdateInProgress);
        }
        let job = self.inner.next_job.fetch_add(1, Ordering::SeqCst);
        tracing::info!(job, uri = uri.unwrap_or(""), "library update requested");
        self.inner.events.emit(CoreEvent::UpdateStarted);

        match self.inner.manifest.clone() {
            Some(manifest) => {
                let inner = Arc::clone(&self.inner);
                let spawned = thread::Builder::new()
                    .name("library-update".into())
                    .spawn(move || inner.rescan(&manifest));
                if let Err(e) = spawned {
                    self.inner.finish();
                    return Err(BackendError::other(format!("failed to start update: {e}")));
                }
            }
            None => {
                self.inner
                    .catalog
                    .write()
                    .expect("library catalog poisoned")
                    .updated_at = now();
                self.inner.finish();
            }
        }
        Ok(job)
    }

    fn stats(&self) -> LibraryStats {
        let catalog = self.catalog();
        let artists: BTreeSet<&str> = catalog
            .tracks
            .iter()
            .filter_map(|t| t.artist.as_deref())
            .collect();
        let albums: BTreeSet<&str> = catalog
            .tracks
            .iter()
            .filter_map(|t| t.album.as_deref())
            .collect();
        LibraryStats {
            artists: artists.len(),
            albums: albums.len(),
            songs: catalog.tracks.len(),
            db_playtime: catalog
                .tracks
                .iter()
                .filter_map(|t| t.length_ms)
                .sum::<u64>()
                / 1000,
            db_update: catalog.updated_at,
        }
    }

    fn uri_schemes(&self) -> Vec<String> {
        let schemes: BTreeSet<String> = self
            .catalog()
            .tracks
            .iter()
            .filter_map(|t| t.uri.split_once(':').map(|(scheme, _)| scheme.to_string()))
            .collect();
        schemes.into_iter().collect()
    }
}
