use encore_core::CoreEvent;
use std::fmt;
use std::str::FromStr;

/// Categories of server state a client can wait on with `idle`.
///
/// The declaration order is the order in which changes are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    Database,
    Update,
    StoredPlaylist,
    Playlist,
    Player,
    Mixer,
    Output,
    Options,
    Partition,
    Subscription,
    Message,
}

impl Subsystem {
    pub const ALL: [Subsystem; 11] = [
        Subsystem::Database,
        Subsystem::Update,
        Subsystem::StoredPlaylist,
        Subsystem::Playlist,
        Subsystem::Player,
        Subsystem::Mixer,
        Subsystem::Output,
        Subsystem::Options,
        Subsystem::Partition,
        Subsystem::Subscription,
        Subsystem::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Database => "database",
            Subsystem::Update => "update",
            Subsystem::StoredPlaylist => "stored_playlist",
            Subsystem::Playlist => "playlist",
            Subsystem::Player => "player",
            Subsystem::Mixer => "mixer",
            Subsystem::Output => "output",
            Subsystem::Options => "options",
            Subsystem::Partition => "partition",
            Subsystem::Subscription => "subscription",
            Subsystem::Message => "message",
        }
    }

    /// The subsystem a backend event touches, if clients care about it.
    pub fn for_event(event: &CoreEvent) -> Option<Subsystem> {
        match event {
            CoreEvent::PlaybackStateChanged { .. } | CoreEvent::Seeked { .. } => {
                Some(Subsystem::Player)
            }
            CoreEvent::TracklistChanged | CoreEvent::StreamTitleChanged { .. } => {
                Some(Subsystem::Playlist)
            }
            CoreEvent::PlaylistsLoaded
            | CoreEvent::PlaylistChanged { .. }
            | CoreEvent::PlaylistDeleted { .. } => Some(Subsystem::StoredPlaylist),
            CoreEvent::OptionsChanged => Some(Subsystem::Options),
            CoreEvent::VolumeChanged { .. } => Some(Subsystem::Mixer),
            CoreEvent::MuteChanged { .. } | CoreEvent::OutputChanged { .. } => {
                Some(Subsystem::Output)
            }
            CoreEvent::UpdateStarted | CoreEvent::UpdateFinished => Some(Subsystem::Update),
            CoreEvent::LibraryChanged => Some(Subsystem::Database),
            CoreEvent::TrackPlaybackStarted { .. } | CoreEvent::TrackPlaybackEnded { .. } => None,
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subsystem::ALL
            .into_iter()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| format!("Unrecognized idle event: {s}"))
    }
}
