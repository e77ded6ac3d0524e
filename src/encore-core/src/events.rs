//! Change notifications flowing out of the backend.
//!
//! Backends emit a [`CoreEvent`] after every state change; the protocol
//! layer folds them into idle subsystems.

use crate::models::PlaybackState;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    PlaybackStateChanged {
        old: PlaybackState,
        new: PlaybackState,
    },
    Seeked {
        position_ms: u64,
    },
    TrackPlaybackStarted {
        tlid: u32,
    },
    TrackPlaybackEnded {
        tlid: u32,
    },
    StreamTitleChanged {
        title: String,
    },
    TracklistChanged,
    OptionsChanged,
    VolumeChanged {
        volume: u8,
    },
    MuteChanged {
        mute: bool,
    },
    OutputChanged {
        id: u32,
    },
    PlaylistsLoaded,
    PlaylistChanged {
        uri: String,
    },
    PlaylistDeleted {
        uri: String,
    },
    UpdateStarted,
    UpdateFinished,
    LibraryChanged,
}

/// Receives backend events. Called synchronously on the emitting thread, so
/// implementations must not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &CoreEvent);
}

/// Fan-out point between a backend and whoever listens to it.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .lock()
            .expect("event bus poisoned")
            .push(listener);
    }

    pub fn emit(&self, event: CoreEvent) {
        // snapshot so listeners may subscribe further listeners without deadlocking
        let listeners = self.listeners.lock().expect("event bus poisoned").clone();
        tracing::trace!(?event, listeners = listeners.len(), "emitting core event");
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or_default();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}
