use encore_core::{PlaybackOptions, TlTrack, Track};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::ops::Range;

/// Ordered play queue with a cursor. Entry ids (`tlid`) are handed out
/// sequentially and never reused.
#[derive(Debug, Clone)]
pub struct Queue {
    items: Vec<TlTrack>,
    current: Option<usize>,
    next_id: u32,
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            next_id: 1,
        }
    }
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TlTrack] {
        &self.items
    }

    pub fn current(&self) -> Option<&TlTrack> {
        self.current.and_then(|idx| self.items.get(idx))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn position(&self, tlid: u32) -> Option<usize> {
        self.items.iter().position(|item| item.tlid == tlid)
    }

    /// Inserts `tracks` at `at` (appends when `None` or past the end).
    pub fn insert(&mut self, tracks: Vec<Track>, at: Option<usize>) -> Vec<TlTrack> {
        let at = at.unwrap_or(self.items.len()).min(self.items.len());
        let added: Vec<TlTrack> = tracks
            .into_iter()
            .map(|track| {
                let tlid = self.next_id;
                self.next_id = self.next_id.saturating_add(1);
                TlTrack { tlid, track }
            })
            .collect();
        if let Some(current) = self.current.as_mut() {
            if at <= *current {
                *current += added.len();
            }
        }
        self.items.splice(at..at, added.iter().cloned());
        added
    }

    /// Removes the given entries. If the current entry goes, the cursor
    /// stays on whatever slid into its place.
    pub fn remove(&mut self, tlids: &[u32]) -> Vec<TlTrack> {
        let mut removed = Vec::new();
        for tlid in tlids {
            let Some(idx) = self.position(*tlid) else {
                continue;
            };
            removed.push(self.items.remove(idx));
            match self.current {
                Some(current) if idx < current => self.current = Some(current - 1),
                Some(current) if idx == current => {
                    self.current = if self.items.is_empty() {
                        None
                    } else {
                        Some(idx.min(self.items.len() - 1))
                    };
                }
                _ => {}
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
    }

    pub fn select_index(&mut self, index: usize) -> Option<&TlTrack> {
        if index < self.items.len() {
            self.current = Some(index);
            self.current()
        } else {
            None
        }
    }

    pub fn reset_current(&mut self) {
        self.current = None;
    }

    /// Runs `reorder` and keeps the cursor on the same entry.
    fn keep_cursor(&mut self, reorder: impl FnOnce(&mut Vec<TlTrack>)) {
        let current = self.current().map(|item| item.tlid);
        reorder(&mut self.items);
        self.current = current.and_then(|tlid| self.position(tlid));
    }

    /// Moves `range` so that its first entry ends up at `to`.
    pub fn move_range(&mut self, range: Range<usize>, to: usize) {
        if range.start >= range.end || range.end > self.items.len() {
            return;
        }
        self.keep_cursor(|items| {
            let moved: Vec<TlTrack> = items.drain(range).collect();
            let to = to.min(items.len());
            items.splice(to..to, moved);
        });
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.items.len() && b < self.items.len() {
            self.keep_cursor(|items| items.swap(a, b));
        }
    }

    /// Shuffles a sub-range, or the whole queue. A whole-queue shuffle puts
    /// the current entry first.
    pub fn shuffle(&mut self, range: Option<Range<usize>>) {
        let mut rng = thread_rng();
        match range {
            Some(range) if range.end <= self.items.len() => {
                self.keep_cursor(|items| items[range].shuffle(&mut rng));
            }
            Some(_) => {}
            None => match self.current {
                Some(current_idx) if self.items.len() > 1 => {
                    let current = self.items.remove(current_idx);
                    self.items.shuffle(&mut rng);
                    self.items.insert(0, current);
                    self.current = Some(0);
                }
                _ => self.items.shuffle(&mut rng),
            },
        }
    }

    /// Index that `next` would move to under `options`.
    pub fn next_index(&self, options: PlaybackOptions) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let Some(current) = self.current else {
            return Some(0);
        };
        if options.random && self.items.len() > 1 {
            let mut pick = thread_rng().gen_range(0..self.items.len() - 1);
            if pick >= current {
                pick += 1;
            }
            return Some(pick);
        }
        if current + 1 < self.items.len() {
            Some(current + 1)
        } else if options.repeat {
            Some(0)
        } else {
            None
        }
    }

    /// Index that `previous` would move to.
    pub fn previous_index(&self, options: PlaybackOptions) -> Option<usize> {
        match self.current {
            Some(idx) if idx > 0 => Some(idx - 1),
            Some(_) if options.repeat && !self.items.is_empty() => Some(self.items.len() - 1),
            Some(idx) => Some(idx),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(uri: &str) -> Track {
        Track::new(uri)
    }

    fn uris(queue: &Queue) -> Vec<&str> {
        queue.items().iter().map(|t| t.track.uri.as_str()).collect()
    }

    fn filled(names: &[&str]) -> Queue {
        let mut queue = Queue::new();
        queue.insert(names.iter().map(|n| track(n)).collect(), None);
        queue
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut queue = filled(&["a", "b"]);
        let ids: Vec<u32> = queue.items().iter().map(|t| t.tlid).collect();
        assert_eq!(ids, vec![1, 2]);

        queue.remove(&[2]);
        let added = queue.insert(vec![track("c")], None);
        assert_eq!(added[0].tlid, 3);
    }

    #[test]
    fn insert_before_cursor_shifts_it() {
        let mut queue = filled(&["a", "b"]);
        queue.select_index(1);
        queue.insert(vec![track("x")], Some(0));

        assert_eq!(uris(&queue), vec!["x", "a", "b"]);
        assert_eq!(queue.current().unwrap().track.uri, "b");
    }

    #[test]
    fn removing_current_keeps_cursor_in_place() {
        let mut queue = filled(&["a", "b", "c"]);
        queue.select_index(1);

        queue.remove(&[2]);
        assert_eq!(queue.current().unwrap().track.uri, "c");

        queue.remove(&[3]);
        assert_eq!(queue.current().unwrap().track.uri, "a");
        queue.remove(&[1]);
        assert!(queue.current().is_none());
    }

    #[test]
    fn move_range_follows_current() {
        let mut queue = filled(&["a", "b", "c", "d"]);
        queue.select_index(0);
        queue.move_range(0..2, 2);

        assert_eq!(uris(&queue), vec!["c", "d", "a", "b"]);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn shuffle_keeps_current_at_front() {
        let mut queue = filled(&["a", "b", "c", "d"]);
        queue.select_index(2);

        queue.shuffle(None);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().track.uri, "c");
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn next_index_honours_repeat() {
        let mut queue = filled(&["a", "b"]);
        queue.select_index(1);
        assert_eq!(queue.next_index(PlaybackOptions::default()), None);

        let repeat = PlaybackOptions {
            repeat: true,
            ..PlaybackOptions::default()
        };
        assert_eq!(queue.next_index(repeat), Some(0));
    }

    #[test]
    fn random_next_never_repeats_current() {
        let mut queue = filled(&["a", "b", "c"]);
        queue.select_index(1);
        let random = PlaybackOptions {
            random: true,
            ..PlaybackOptions::default()
        };
        for _ in 0..50 {
            assert_ne!(queue.next_index(random), Some(1));
        }
    }
}
