//! Simulated transport plus play queue.
//!
//! There is no audio output: the deck keeps a wall clock for the playing
//! entry and changes state only when told to.

use crate::queue::Queue;
use encore_core::{
    BackendError, BackendResult, CoreEvent, EventBus, PlaybackOptions, PlaybackState, Playback,
    TlTrack, Track, Tracklist,
};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Longest queue the deck accepts.
pub const MAX_QUEUE_ITEMS: usize = 10_000;

#[derive(Debug, Default)]
struct Clock {
    offset_ms: u64,
    running_since: Option<Instant>,
}

impl Clock {
    fn position_ms(&self) -> u64 {
        let running = self
            .running_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.offset_ms.saturating_add(running)
    }

    fn start_at(&mut self, position_ms: u64) {
        self.offset_ms = position_ms;
        self.running_since = Some(Instant::now());
    }

    fn hold(&mut self) {
        self.offset_ms = self.position_ms();
        self.running_since = None;
    }

    fn reset(&mut self) {
        *self = Clock::default();
    }
}

#[derive(Debug, Default)]
struct DeckState {
    queue: Queue,
    state: PlaybackState,
    options: PlaybackOptions,
    version: u32,
    clock: Clock,
}

impl DeckState {
    fn touch(&mut self, events: &mut Vec<CoreEvent>) {
        self.version = self.version.wrapping_add(1);
        events.push(CoreEvent::TracklistChanged);
    }

    fn set_state(&mut self, new: PlaybackState, events: &mut Vec<CoreEvent>) {
        let old = self.state;
        if old != new {
            self.state = new;
            events.push(CoreEvent::PlaybackStateChanged { old, new });
        }
    }

    /// Switches the cursor to `index` and starts it from the top.
    fn start_index(&mut self, index: usize, events: &mut Vec<CoreEvent>) -> BackendResult<()> {
        let previous = self.playing_tlid();
        let tlid = self
            .queue
            .select_index(index)
            .map(|entry| entry.tlid)
            .ok_or_else(|| BackendError::not_found("song"))?;
        if let Some(old) = previous {
            events.push(CoreEvent::TrackPlaybackEnded { tlid: old });
        }
        self.clock.start_at(0);
        self.set_state(PlaybackState::Playing, events);
        events.push(CoreEvent::TrackPlaybackStarted { tlid });
        Ok(())
    }

    fn playing_tlid(&self) -> Option<u32> {
        match self.state {
            PlaybackState::Stopped => None,
            _ => self.queue.current().map(|entry| entry.tlid),
        }
    }

    fn halt(&mut self, events: &mut Vec<CoreEvent>) {
        if let Some(tlid) = self.playing_tlid() {
            events.push(CoreEvent::TrackPlaybackEnded { tlid });
        }
        self.clock.reset();
        self.set_state(PlaybackState::Stopped, events);
    }
}

/// In-memory [`Playback`] and [`Tracklist`] sharing one queue.
#[derive(Clone)]
pub struct Deck {
    inner: Arc<Mutex<DeckState>>,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck").finish_non_exhaustive()
    }
}

impl Deck {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeckState::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeckState> {
        self.inner.lock().expect("deck state poisoned")
    }

    /// Runs `op` under the lock, then publishes whatever it queued.
    fn apply<T>(
        &self,
        op: impl FnOnce(&mut DeckState, &mut Vec<CoreEvent>) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut events = Vec::new();
        let result = {
            let mut state = self.lock();
            op(&mut state, &mut events)
        };
        for event in events {
            self.events.emit(event);
        }
        result
    }
}

impl Playback for Deck {
    fn state(&self) -> PlaybackState {
        self.lock().state
    }

    fn current(&self) -> Option<TlTrack> {
        self.lock().queue.current().cloned()
    }

    fn time_position_ms(&self) -> u64 {
        let state = self.lock();
        match state.state {
            PlaybackState::Stopped => 0,
            _ => {
                let position = state.clock.position_ms();
                match state.queue.current().and_then(|e| e.track.length_ms) {
                    Some(length) => position.min(length),
                    None => position,
                }
            }
        }
    }

    fn play(&self, tlid: Option<u32>) -> BackendResult<()> {
        self.apply(|deck, events| {
            let index = match tlid {
                Some(tlid) => deck
                    .queue
                    .position(tlid)
                    .ok_or_else(|| BackendError::not_found("song"))?,
                None => match deck.queue.current_index() {
                    Some(index) => index,
                    None if deck.queue.is_empty() => return Ok(()),
                    None => 0,
                },
            };
            deck.start_index(index, events)
        })
    }

    fn pause(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.state == PlaybackState::Playing {
                deck.clock.hold();
                deck.set_state(PlaybackState::Paused, events);
            }
            Ok(())
        })
    }

    fn resume(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.state == PlaybackState::Paused {
                let at = deck.clock.position_ms();
                deck.clock.start_at(at);
                deck.set_state(PlaybackState::Playing, events);
            }
            Ok(())
        })
    }

    fn stop(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            deck.halt(events);
            Ok(())
        })
    }

    fn next(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.state == PlaybackState::Stopped {
                return Ok(());
            }
            let options = deck.options;
            let Some(mut index) = deck.queue.next_index(options) else {
                deck.halt(events);
                return Ok(());
            };
            if options.consume {
                if let Some(current) = deck.queue.current_index() {
                    let tlid = deck.queue.items()[current].tlid;
                    if let Some(old) = deck.playing_tlid() {
                        events.push(CoreEvent::TrackPlaybackEnded { tlid: old });
                    }
                    deck.queue.remove(&[tlid]);
                    deck.queue.reset_current();
                    deck.touch(events);
                    if index > current {
                        index -= 1;
                    }
                    if deck.queue.is_empty() {
                        deck.clock.reset();
                        deck.set_state(PlaybackState::Stopped, events);
                        return Ok(());
                    }
                }
            }
            deck.start_index(index, events)
        })
    }

    fn previous(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.state == PlaybackState::Stopped {
                return Ok(());
            }
            match deck.queue.previous_index(deck.options) {
                Some(index) => deck.start_index(index, events),
                None => Ok(()),
            }
        })
    }

    fn seek(&self, position_ms: u64) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.state == PlaybackState::Stopped {
                return Err(BackendError::SyncConflict {
                    message: "Not playing".into(),
                });
            }
            if let Some(length) = deck.queue.current().and_then(|e| e.track.length_ms) {
                if position_ms > length {
                    return Err(BackendError::InvalidArgument {
                        message: "Seek position is past the end of the song".into(),
                    });
                }
            }
            if deck.state == PlaybackState::Playing {
                deck.clock.start_at(position_ms);
            } else {
                deck.clock.offset_ms = position_ms;
            }
            events.push(CoreEvent::Seeked { position_ms });
            Ok(())
        })
    }
}

impl Tracklist for Deck {
    fn tracks(&self) -> Vec<TlTrack> {
        self.lock().queue.items().to_vec()
    }

    fn length(&self) -> usize {
        self.lock().queue.len()
    }

    fn version(&self) -> u32 {
        self.lock().version
    }

    fn index_of(&self, tlid: u32) -> Option<usize> {
        self.lock().queue.position(tlid)
    }

    fn next_tlid(&self) -> Option<u32> {
        let deck = self.lock();
        deck.queue.current()?;
        if deck.options.random {
            return None;
        }
        deck.queue
            .next_index(deck.options)
            .map(|index| deck.queue.items()[index].tlid)
    }

    fn add(&self, tracks: Vec<Track>, at: Option<usize>) -> BackendResult<Vec<TlTrack>> {
        self.apply(|deck, events| {
            if deck.queue.len() + tracks.len() > MAX_QUEUE_ITEMS {
                return Err(BackendError::AtCapacity {
                    message: "Playlist is too large".into(),
                });
            }
            if tracks.is_empty() {
                return Ok(Vec::new());
            }
            let added = deck.queue.insert(tracks, at);
            deck.touch(events);
            Ok(added)
        })
    }

    fn remove(&self, tlids: &[u32]) -> BackendResult<Vec<TlTrack>> {
        self.apply(|deck, events| {
            let playing = deck.playing_tlid();
            let removed = deck.queue.remove(tlids);
            if removed.is_empty() {
                return Ok(removed);
            }
            if playing.is_some_and(|tlid| removed.iter().any(|r| r.tlid == tlid)) {
                deck.halt(events);
                if deck.queue.is_empty() {
                    deck.queue.reset_current();
                }
            }
            deck.touch(events);
            Ok(removed)
        })
    }

    fn clear(&self) -> BackendResult<()> {
        self.apply(|deck, events| {
            deck.halt(events);
            deck.queue.clear();
            deck.touch(events);
            Ok(())
        })
    }

    fn move_range(&self, range: Range<usize>, to: usize) -> BackendResult<()> {
        self.apply(|deck, events| {
            if range.end > deck.queue.len() || to + range.len() > deck.queue.len() {
                return Err(BackendError::InvalidArgument {
                    message: "Bad song index".into(),
                });
            }
            deck.queue.move_range(range, to);
            deck.touch(events);
            Ok(())
        })
    }

    fn swap(&self, a: usize, b: usize) -> BackendResult<()> {
        self.apply(|deck, events| {
            if a >= deck.queue.len() || b >= deck.queue.len() {
                return Err(BackendError::InvalidArgument {
                    message: "Bad song index".into(),
                });
            }
            deck.queue.swap(a, b);
            deck.touch(events);
            Ok(())
        })
    }

    fn shuffle(&self, range: Option<Range<usize>>) -> BackendResult<()> {
        self.apply(|deck, events| {
            if range.as_ref().is_some_and(|r| r.end > deck.queue.len()) {
                return Err(BackendError::InvalidArgument {
                    message: "Bad song index".into(),
                });
            }
            // The cursor only pins to the front while something is playing.
            if range.is_none() && deck.state == PlaybackState::Stopped {
                deck.queue.reset_current();
            }
            deck.queue.shuffle(range);
            deck.touch(events);
            Ok(())
        })
    }

    fn options(&self) -> PlaybackOptions {
        self.lock().options
    }

    fn set_options(&self, options: PlaybackOptions) -> BackendResult<()> {
        self.apply(|deck, events| {
            if deck.options != options {
                deck.options = options;
                events.push(CoreEvent::OptionsChanged);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::EventListener;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CoreEvent>>);

    impl EventListener for Recorder {
        fn on_event(&self, event: &CoreEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn deck_with(uris: &[&str]) -> (Deck, Arc<Recorder>) {
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        let deck = Deck::new(bus);
        deck.add(uris.iter().map(|u| Track::new(*u)).collect(), None)
            .unwrap();
        recorder.0.lock().unwrap().clear();
        (deck, recorder)
    }

    #[test]
    fn play_starts_first_entry() {
        let (deck, recorder) = deck_with(&["a", "b"]);
        deck.play(None).unwrap();

        assert_eq!(deck.state(), PlaybackState::Playing);
        assert_eq!(deck.current().unwrap().track.uri, "a");
        let events = recorder.0.lock().unwrap();
        assert!(events.contains(&CoreEvent::TrackPlaybackStarted { tlid: 1 }));
    }

    #[test]
    fn play_on_empty_queue_is_a_no_op() {
        let (deck, recorder) = deck_with(&[]);
        deck.play(None).unwrap();
        assert_eq!(deck.state(), PlaybackState::Stopped);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_entry_is_not_found() {
        let (deck, _) = deck_with(&["a"]);
        assert!(matches!(
            deck.play(Some(42)),
            Err(BackendError::NotFound { .. })
        ));
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let (deck, _) = deck_with(&["a"]);
        deck.play(None).unwrap();
        deck.pause().unwrap();
        assert_eq!(deck.state(), PlaybackState::Paused);
        deck.resume().unwrap();
        assert_eq!(deck.state(), PlaybackState::Playing);
    }

    #[test]
    fn stop_keeps_cursor_for_status() {
        let (deck, _) = deck_with(&["a", "b"]);
        deck.play(Some(2)).unwrap();
        deck.stop().unwrap();

        assert_eq!(deck.state(), PlaybackState::Stopped);
        assert_eq!(deck.current().unwrap().tlid, 2);
        assert_eq!(deck.time_position_ms(), 0);
    }

    #[test]
    fn next_past_end_stops() {
        let (deck, _) = deck_with(&["a"]);
        deck.play(None).unwrap();
        deck.next().unwrap();
        assert_eq!(deck.state(), PlaybackState::Stopped);
    }

    #[test]
    fn consume_removes_finished_entry() {
        let (deck, _) = deck_with(&["a", "b", "c"]);
        deck.set_options(PlaybackOptions {
            consume: true,
            ..PlaybackOptions::default()
        })
        .unwrap();
        deck.play(None).unwrap();
        deck.next().unwrap();

        let uris: Vec<String> = deck.tracks().into_iter().map(|t| t.track.uri).collect();
        assert_eq!(uris, vec!["b", "c"]);
        assert_eq!(deck.current().unwrap().track.uri, "b");
    }

    #[test]
    fn seek_requires_playback() {
        let (deck, _) = deck_with(&["a"]);
        assert!(matches!(
            deck.seek(1_000),
            Err(BackendError::SyncConflict { .. })
        ));

        deck.play(None).unwrap();
        deck.pause().unwrap();
        deck.seek(5_000).unwrap();
        assert_eq!(deck.time_position_ms(), 5_000);
    }

    #[test]
    fn every_queue_change_bumps_version() {
        let (deck, recorder) = deck_with(&["a", "b"]);
        let before = deck.version();
        deck.swap(0, 1).unwrap();
        deck.remove(&[1]).unwrap();

        assert_eq!(deck.version(), before + 2);
        let changes = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == CoreEvent::TracklistChanged)
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn removing_playing_entry_stops() {
        let (deck, _) = deck_with(&["a", "b"]);
        deck.play(Some(1)).unwrap();
        deck.remove(&[1]).unwrap();
        assert_eq!(deck.state(), PlaybackState::Stopped);
    }

    #[test]
    fn oversized_add_is_rejected() {
        let (deck, _) = deck_with(&[]);
        let tracks = (0..=MAX_QUEUE_ITEMS).map(|i| Track::new(format!("t{i}"))).collect();
        assert!(matches!(
            deck.add(tracks, None),
            Err(BackendError::AtCapacity { .. })
        ));
    }

    #[test]
    fn unchanged_options_emit_nothing() {
        let (deck, recorder) = deck_with(&[]);
        deck.set_options(PlaybackOptions::default()).unwrap();
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
