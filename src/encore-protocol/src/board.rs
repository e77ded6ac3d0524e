//! Process-wide client-to-client message channels.

use crate::session::SessionId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use thiserror::Error;

/// Unread messages kept per session; sends to a full inbox skip it.
pub const MAX_PENDING_MESSAGES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("invalid channel name")]
    InvalidName,
    #[error("already subscribed to this channel")]
    AlreadySubscribed,
    #[error("not subscribed to this channel")]
    NotSubscribed,
    #[error("nobody is subscribed to this channel")]
    NoSubscribers,
    #[error("message queue is full")]
    InboxesFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Default)]
struct BoardState {
    subscribers: BTreeMap<String, BTreeSet<SessionId>>,
    inboxes: HashMap<SessionId, Vec<Message>>,
}

#[derive(Debug, Default)]
pub struct MessageBoard {
    state: Mutex<BoardState>,
}

pub fn valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-'))
}

impl MessageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session: SessionId, channel: &str) -> Result<(), BoardError> {
        if !valid_channel_name(channel) {
            return Err(BoardError::InvalidName);
        }
        let mut state = self.state.lock().expect("message board poisoned");
        let added = state
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .insert(session);
        if added {
            Ok(())
        } else {
            Err(BoardError::AlreadySubscribed)
        }
    }

    pub fn unsubscribe(&self, session: SessionId, channel: &str) -> Result<(), BoardError> {
        let mut state = self.state.lock().expect("message board poisoned");
        let removed = state
            .subscribers
            .get_mut(channel)
            .is_some_and(|subs| subs.remove(&session));
        if !removed {
            return Err(BoardError::NotSubscribed);
        }
        if state.subscribers.get(channel).is_some_and(BTreeSet::is_empty) {
            state.subscribers.remove(channel);
        }
        Ok(())
    }

    /// Channels with at least one subscriber, sorted.
    pub fn channels(&self) -> Vec<String> {
        let state = self.state.lock().expect("message board poisoned");
        state.subscribers.keys().cloned().collect()
    }

    /// Queues `text` for every subscriber of `channel` with room left and
    /// returns how many got it.
    pub fn send(&self, channel: &str, text: &str) -> Result<usize, BoardError> {
        if !valid_channel_name(channel) {
            return Err(BoardError::InvalidName);
        }
        let mut state = self.state.lock().expect("message board poisoned");
        let recipients: Vec<SessionId> = state
            .subscribers
            .get(channel)
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default();
        if recipients.is_empty() {
            return Err(BoardError::NoSubscribers);
        }
        let mut delivered = 0;
        for session in &recipients {
            let inbox = state.inboxes.entry(*session).or_default();
            if inbox.len() >= MAX_PENDING_MESSAGES {
                tracing::debug!(session, channel, "inbox full, message dropped");
                continue;
            }
            inbox.push(Message {
                channel: channel.to_string(),
                text: text.to_string(),
            });
            delivered += 1;
        }
        if delivered == 0 {
            return Err(BoardError::InboxesFull);
        }
        Ok(delivered)
    }

    /// Drains the messages waiting for `session`.
    pub fn take(&self, session: SessionId) -> Vec<Message> {
        let mut state = self.state.lock().expect("message board poisoned");
        state.inboxes.remove(&session).unwrap_or_default()
    }

    /// Drops every subscription and pending message of a departing session.
    pub fn forget(&self, session: SessionId) {
        let mut state = self.state.lock().expect("message board poisoned");
        state.inboxes.remove(&session);
        state.subscribers.retain(|_, subs| {
            subs.remove(&session);
            !subs.is_empty()
        });
    }
}
