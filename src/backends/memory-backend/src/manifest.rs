//! JSON library manifest.
//!
//! ```json
//! {
//!   "version": 1,
//!   "tracks": [
//!     { "uri": "local:track:a.flac", "title": "A", "length_ms": 215000, "art": "covers/a.jpg" }
//!   ]
//! }
//! ```
//!
//! Relative `art` paths resolve against the manifest's directory.

use encore_core::Track;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MANIFEST_VERSION: u32 = 1;

/// Refuse manifests larger than this (64 MB).
const MAX_MANIFEST_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("manifest version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("manifest too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("duplicate track uri {uri}")]
    DuplicateUri { uri: String },
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: u32,
    #[serde(default)]
    tracks: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(flatten)]
    track: Track,
    #[serde(default)]
    art: Option<PathBuf>,
}

/// A track plus the cover art file that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub track: Track,
    pub art: Option<PathBuf>,
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let size = fs::metadata(path)
        .map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > MAX_MANIFEST_SIZE {
        return Err(ManifestError::TooLarge {
            size,
            max: MAX_MANIFEST_SIZE,
        });
    }

    let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&contents, path)
}

fn parse_manifest(contents: &str, path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let raw: RawManifest = serde_json::from_str(contents).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.version != MANIFEST_VERSION {
        return Err(ManifestError::UnsupportedVersion {
            found: raw.version,
            expected: MANIFEST_VERSION,
        });
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::with_capacity(raw.tracks.len());
    for entry in raw.tracks {
        if !seen.insert(entry.track.uri.clone()) {
            return Err(ManifestError::DuplicateUri {
                uri: entry.track.uri,
            });
        }
        let art = entry.art.map(|art| {
            if art.is_absolute() {
                art
            } else {
                base.join(art)
            }
        });
        entries.push(ManifestEntry {
            track: entry.track,
            art,
        });
    }

    tracing::debug!(tracks = entries.len(), path = %path.display(), "parsed library manifest");
    Ok(entries)
}
