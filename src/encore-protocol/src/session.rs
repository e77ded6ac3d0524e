use crate::ack::AckError;
use encore_core::Tag;
use std::collections::BTreeSet;

pub type SessionId = u64;

/// Default size of one `albumart`/`readpicture` chunk.
pub const DEFAULT_BINARY_LIMIT: usize = 8192;

/// A command waiting in an open command list: its tokens, or the parse
/// failure to report once the list runs.
pub(crate) type Queued = Result<Vec<String>, AckError>;

#[derive(Debug, Default)]
pub(crate) enum ListMode {
    #[default]
    Off,
    Collecting {
        verbose: bool,
        queue: Vec<Queued>,
    },
}

/// Protocol state owned by one connection.
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,
    pub authenticated: bool,
    pub(crate) list: ListMode,
    /// Tags included when this client is sent track metadata.
    pub tagtypes: BTreeSet<Tag>,
    pub binary_limit: usize,
}

impl SessionState {
    pub fn new(id: SessionId, authenticated: bool) -> Self {
        Self {
            id,
            authenticated,
            list: ListMode::Off,
            tagtypes: Tag::ALL.into_iter().collect(),
            binary_limit: DEFAULT_BINARY_LIMIT,
        }
    }

    pub fn in_command_list(&self) -> bool {
        matches!(self.list, ListMode::Collecting { .. })
    }
}
