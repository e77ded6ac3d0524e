use encore_core::BackendError;
use thiserror::Error;

/// Numeric error classes of the `ACK` line. Clients switch on these values,
/// so they never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    /// Recognised command this server does not carry out.
    NotImplemented = 0,
    NotList = 1,
    Arg = 2,
    Password = 3,
    Permission = 4,
    Unknown = 5,
    NoExist = 50,
    PlaylistMax = 51,
    System = 52,
    PlaylistLoad = 53,
    UpdateAlready = 54,
    PlayerSync = 55,
    Exist = 56,
}

impl AckCode {
    pub fn value(self) -> u16 {
        self as u16
    }
}

/// A failed command, rendered as
/// `ACK [<code>@<index>] {<command>} <message>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ACK [{}@{index}] {{{command}}} {message}", .code.value())]
pub struct AckError {
    pub code: AckCode,
    /// 1-based position inside a command list, 0 otherwise.
    pub index: usize,
    pub command: String,
    pub message: String,
}

impl AckError {
    pub fn new(code: AckCode, command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            index: 0,
            command: command.into(),
            message: message.into(),
        }
    }

    /// Error whose command name is filled in later by the dispatcher.
    pub fn bare(code: AckCode, message: impl Into<String>) -> Self {
        Self::new(code, "", message)
    }

    pub fn arg(message: impl Into<String>) -> Self {
        Self::bare(AckCode::Arg, message)
    }

    pub fn no_exist(message: impl Into<String>) -> Self {
        Self::bare(AckCode::NoExist, message)
    }

    pub fn exist(message: impl Into<String>) -> Self {
        Self::bare(AckCode::Exist, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::bare(AckCode::System, message)
    }

    pub fn unknown_command(name: &str) -> Self {
        Self::new(AckCode::Unknown, name, format!("unknown command \"{name}\""))
    }

    pub fn no_command() -> Self {
        Self::bare(AckCode::Unknown, "No command given")
    }

    pub fn permission(name: &str) -> Self {
        Self::new(
            AckCode::Permission,
            name,
            format!("you don't have permission for \"{name}\""),
        )
    }

    pub fn wrong_arity(name: &str) -> Self {
        Self::new(
            AckCode::Arg,
            name,
            format!("wrong number of arguments for \"{name}\""),
        )
    }

    pub fn bad_song_index() -> Self {
        Self::arg("Bad song index")
    }

    pub fn not_implemented() -> Self {
        Self::bare(AckCode::NotImplemented, "Not implemented")
    }

    pub fn no_such_song() -> Self {
        Self::no_exist("No such song")
    }

    /// Fills in the command name unless the error already names one.
    pub fn for_command(mut self, name: &str) -> Self {
        if self.command.is_empty() && self.code != AckCode::Unknown {
            self.command = name.to_string();
        }
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

impl From<BackendError> for AckError {
    fn from(err: BackendError) -> Self {
        let code = match &err {
            BackendError::NotFound { .. } => AckCode::NoExist,
            BackendError::AlreadyExists { .. } => AckCode::Exist,
            BackendError::AtCapacity { .. } => AckCode::PlaylistMax,
            BackendError::LoadFailed { .. } => AckCode::PlaylistLoad,
            BackendError::UpdateInProgress => AckCode::UpdateAlready,
            BackendError::SyncConflict { .. } => AckCode::PlayerSync,
            BackendError::InvalidArgument { .. } => AckCode::Arg,
            BackendError::NotSupported { .. } | BackendError::Other { .. } => AckCode::System,
        };
        AckError::bare(code, err.to_string())
    }
}
