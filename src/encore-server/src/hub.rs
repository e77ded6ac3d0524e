//! Idle/notify hub.
//!
//! Every connected session is registered here. Changes that arrive while a
//! session is busy accumulate as pending, so the next `idle` returns at once.
//! A parked session holds a oneshot receiver; the matching sender is taken
//! out of the registry under the lock, so each wakeup fires at most once.

use encore_protocol::{Notifier, SessionId, Subsystem};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

pub type Changes = BTreeSet<Subsystem>;

/// Result of [`IdleHub::subscribe`].
#[derive(Debug)]
pub enum Subscription {
    /// Something the session asked for already changed.
    Ready(Changes),
    /// Nothing yet; wait on the receiver.
    Parked(oneshot::Receiver<Changes>),
}

#[derive(Debug)]
struct Waiter {
    wanted: Changes,
    wake: oneshot::Sender<Changes>,
}

#[derive(Debug, Default)]
struct Entry {
    pending: Changes,
    waiter: Option<Waiter>,
}

#[derive(Debug, Default)]
pub struct IdleHub {
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl IdleHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.lock().expect("idle hub poisoned")
    }

    pub fn register(&self, session: SessionId) {
        self.lock().entry(session).or_default();
    }

    /// Forgets the session; a parked waiter sees its sender dropped.
    pub fn deregister(&self, session: SessionId) {
        self.lock().remove(&session);
    }

    pub fn subscribe(&self, session: SessionId, wanted: Changes) -> Subscription {
        let mut sessions = self.lock();
        let entry = sessions.entry(session).or_default();

        let ready: Changes = entry.pending.intersection(&wanted).copied().collect();
        if !ready.is_empty() {
            entry.pending.retain(|sub| !ready.contains(sub));
            return Subscription::Ready(ready);
        }

        let (wake, rx) = oneshot::channel();
        entry.waiter = Some(Waiter { wanted, wake });
        Subscription::Parked(rx)
    }

    /// Withdraws a parked subscription (`noidle`). Returns whatever the
    /// session was waiting for that is already pending, normally nothing.
    pub fn unsubscribe(&self, session: SessionId) -> Changes {
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(&session) else {
            return Changes::new();
        };
        let Some(waiter) = entry.waiter.take() else {
            return Changes::new();
        };
        let hit: Changes = entry.pending.intersection(&waiter.wanted).copied().collect();
        entry.pending.retain(|sub| !hit.contains(sub));
        hit
    }

    pub fn publish(&self, subsystem: Subsystem) {
        self.publish_many(std::iter::once(subsystem));
    }

    /// Wakes every parked session interested in any of `changed` and records
    /// the rest as pending.
    pub fn publish_many(&self, changed: impl IntoIterator<Item = Subsystem>) {
        let changed: Changes = changed.into_iter().collect();
        if changed.is_empty() {
            return;
        }
        let mut woken = 0usize;
        let mut sessions = self.lock();
        for entry in sessions.values_mut() {
            let hit = entry
                .waiter
                .as_ref()
                .map(|w| w.wanted.intersection(&changed).copied().collect::<Changes>())
                .unwrap_or_default();
            for sub in changed.difference(&hit) {
                entry.pending.insert(*sub);
            }
            if hit.is_empty() {
                continue;
            }
            if let Some(waiter) = entry.waiter.take() {
                if let Err(missed) = waiter.wake.send(hit) {
                    // Receiver already gone; keep the changes for later.
                    entry.pending.extend(missed);
                } else {
                    woken += 1;
                }
            }
        }
        drop(sessions);
        tracing::trace!(?changed, woken, "published changes");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Notifier for IdleHub {
    fn notify(&self, subsystem: Subsystem) {
        self.publish(subsystem);
    }
}
