use serde::{Deserialize, Serialize};

/// Track metadata as reported by the backend library.
///
/// `uri` is the only required field; everything else is optional so that
/// sparse sources (streams, bare files) can still be queued.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Track {
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub track_no: Option<u32>,
    #[serde(default)]
    pub disc_no: Option<u32>,
    /// Length in milliseconds when known.
    #[serde(default)]
    pub length_ms: Option<u64>,
    /// Bitrate in kbit/s when known.
    #[serde(default)]
    pub bitrate: Option<u32>,
    /// Modification time as seconds since the unix epoch.
    #[serde(default)]
    pub last_modified: Option<i64>,
    #[serde(default)]
    pub musicbrainz_trackid: Option<String>,
}

impl Track {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Value of a tag field, if the track carries it.
    pub fn tag(&self, tag: Tag) -> Option<String> {
        match tag {
            Tag::Artist => self.artist.clone(),
            Tag::Album => self.album.clone(),
            Tag::AlbumArtist => self.album_artist.clone(),
            Tag::Title => self.title.clone(),
            Tag::Track => self.track_no.map(|n| n.to_string()),
            Tag::Genre => self.genre.clone(),
            Tag::Date => self.date.clone(),
            Tag::Disc => self.disc_no.map(|n| n.to_string()),
            Tag::MusicBrainzTrackId => self.musicbrainz_trackid.clone(),
        }
    }
}

/// A track as it sits in the play queue. `tlid` is stable for the lifetime
/// of the entry, unlike its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlTrack {
    pub tlid: u32,
    pub track: Track,
}

/// Tag fields clients can filter on and enable per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Artist,
    Album,
    AlbumArtist,
    Title,
    Track,
    Genre,
    Date,
    Disc,
    MusicBrainzTrackId,
}

impl Tag {
    pub const ALL: [Tag; 9] = [
        Tag::Artist,
        Tag::Album,
        Tag::AlbumArtist,
        Tag::Title,
        Tag::Track,
        Tag::Genre,
        Tag::Date,
        Tag::Disc,
        Tag::MusicBrainzTrackId,
    ];

    /// Canonical spelling used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Artist => "Artist",
            Tag::Album => "Album",
            Tag::AlbumArtist => "AlbumArtist",
            Tag::Title => "Title",
            Tag::Track => "Track",
            Tag::Genre => "Genre",
            Tag::Date => "Date",
            Tag::Disc => "Disc",
            Tag::MusicBrainzTrackId => "MUSICBRAINZ_TRACKID",
        }
    }

    /// Case-insensitive lookup of a tag name.
    pub fn parse(name: &str) -> Option<Tag> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(name))
    }
}

/// What a library search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Any,
    File,
    Tag(Tag),
}

impl SearchField {
    pub fn parse(name: &str) -> Option<SearchField> {
        if name.eq_ignore_ascii_case("any") {
            Some(SearchField::Any)
        } else if name.eq_ignore_ascii_case("file") {
            Some(SearchField::File)
        } else {
            Tag::parse(name).map(SearchField::Tag)
        }
    }

    pub fn matches(&self, track: &Track, needle: &str, exact: bool) -> bool {
        let hit = |value: &str| {
            if exact {
                value == needle
            } else {
                value.to_lowercase().contains(&needle.to_lowercase())
            }
        };
        match self {
            SearchField::File => hit(&track.uri),
            SearchField::Tag(tag) => track.tag(*tag).is_some_and(|v| hit(&v)),
            SearchField::Any => {
                hit(&track.uri)
                    || Tag::ALL
                        .iter()
                        .filter_map(|tag| track.tag(*tag))
                        .any(|v| hit(&v))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Queue playback modes toggled by `repeat`, `random`, `single` and `consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackOptions {
    pub repeat: bool,
    pub random: bool,
    pub single: bool,
    pub consume: bool,
}

/// Summary of a stored playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub uri: String,
    pub name: String,
    /// Seconds since the unix epoch.
    pub last_modified: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub uri: String,
    pub name: String,
    pub tracks: Vec<Track>,
    pub last_modified: Option<i64>,
}

impl Playlist {
    pub fn info(&self) -> PlaylistInfo {
        PlaylistInfo {
            uri: self.uri.clone(),
            name: self.name.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// An audio output as enumerated by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Track {
        Track {
            title: Some("Blue in Green".into()),
            artist: Some("Miles Davis".into()),
            album: Some("Kind of Blue".into()),
            track_no: Some(3),
            ..Track::new("local:track:kob/03.flac")
        }
    }

    #[test]
    fn tag_names_parse_case_insensitively() {
        assert_eq!(Tag::parse("albumartist"), Some(Tag::AlbumArtist));
        assert_eq!(Tag::parse("musicbrainz_trackid"), Some(Tag::MusicBrainzTrackId));
        assert_eq!(Tag::parse("composer"), None);
    }

    #[test]
    fn search_fields_match_substrings_unless_exact() {
        let track = sample();
        let artist = SearchField::Tag(Tag::Artist);
        assert!(artist.matches(&track, "miles", false));
        assert!(!artist.matches(&track, "miles", true));
        assert!(artist.matches(&track, "Miles Davis", true));
        assert!(SearchField::Any.matches(&track, "kind of", false));
        assert!(SearchField::File.matches(&track, "kob/", false));
        assert!(SearchField::Tag(Tag::Track).matches(&track, "3", true));
        assert!(!SearchField::Tag(Tag::Genre).matches(&track, "", false));
    }
}
