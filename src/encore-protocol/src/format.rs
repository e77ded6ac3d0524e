//! Rendering of tracks and timestamps as response fields.

use crate::response::Response;
use chrono::DateTime;
use encore_core::{Tag, TlTrack, Track};
use std::collections::BTreeSet;

/// `2026-03-01T12:00:00Z` style timestamp for unix seconds.
pub fn iso_timestamp(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Appends the metadata block of `track`. Tag fields appear only when the
/// session enabled them and the track has a value.
pub fn track(out: &mut Response, track: &Track, tagtypes: &BTreeSet<Tag>) {
    out.field("file", &track.uri);
    if let Some(modified) = track.last_modified.and_then(iso_timestamp) {
        out.field("Last-Modified", modified);
    }
    if let Some(length) = track.length_ms {
        out.field("Time", length / 1000);
        out.field("duration", format!("{:.3}", length as f64 / 1000.0));
    }
    for tag in Tag::ALL {
        if !tagtypes.contains(&tag) {
            continue;
        }
        if let Some(value) = track.tag(tag).filter(|v| !v.is_empty()) {
            out.field(tag.name(), value);
        }
    }
}

/// Like [`track`], plus the queue position and id.
pub fn queued_track(out: &mut Response, entry: &TlTrack, pos: usize, tagtypes: &BTreeSet<Tag>) {
    track(out, &entry.track, tagtypes);
    out.field("Pos", pos);
    out.field("Id", entry.tlid);
}
