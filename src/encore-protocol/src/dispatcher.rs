use crate::ack::{AckCode, AckError};
use crate::board::MessageBoard;
use crate::context::{Context, Notifier, ProtocolSettings};
use crate::registry::{Registry, Reply};
use crate::response::Frame;
use crate::session::{ListMode, SessionId, SessionState};
use crate::subsystem::Subsystem;
use crate::tokenize::tokenize;
use crate::uri_map::UriMapper;
use crate::PROTOCOL_VERSION;
use encore_core::Backend;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// What the connection should do after a request line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Write these frames; the last one is `OK` or an `ACK` line.
    Respond(Vec<Frame>),
    /// The line went into an open command list; nothing to write.
    Pending,
    /// Wait for one of these subsystems to change.
    Idle(BTreeSet<Subsystem>),
    /// Drop the connection without replying.
    Close,
}

/// Shared, read-only command engine. One per server; sessions bring their
/// own [`SessionState`].
pub struct Dispatcher {
    backend: Backend,
    registry: Registry,
    settings: ProtocolSettings,
    uri_map: UriMapper,
    board: MessageBoard,
    notifier: Arc<dyn Notifier>,
    started: Instant,
}

impl Dispatcher {
    pub fn new(backend: Backend, settings: ProtocolSettings, notifier: Arc<dyn Notifier>) -> Self {
        let registry = Registry::builtin(&settings.command_blacklist);
        tracing::debug!(
            commands = registry.len(),
            blacklisted = settings.command_blacklist.len(),
            "command registry built"
        );
        Self {
            backend,
            registry,
            settings,
            uri_map: UriMapper::new(),
            board: MessageBoard::new(),
            notifier,
            started: Instant::now(),
        }
    }

    pub fn greeting() -> String {
        format!("OK MPD {PROTOCOL_VERSION}")
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fresh state for a new connection; authenticated unless a password is set.
    pub fn open_session(&self, id: SessionId) -> SessionState {
        SessionState::new(id, self.settings.password.is_none())
    }

    /// Releases shared resources held on behalf of a departing session.
    pub fn close_session(&self, session: &SessionState) {
        self.board.forget(session.id);
    }

    /// Reply to a finished idle: one `changed:` line per subsystem, then `OK`.
    pub fn idle_reply(changed: &BTreeSet<Subsystem>) -> Vec<Frame> {
        changed
            .iter()
            .map(|sub| Frame::Line(format!("changed: {sub}")))
            .chain(std::iter::once(Frame::ok()))
            .collect()
    }

    /// Handles one request line (terminator already stripped).
    pub fn handle_line(&self, session: &mut SessionState, line: &str) -> Outcome {
        let parsed = tokenize(line)
            .map_err(|err| AckError::arg(err.to_string()).for_command(first_word(line)));

        if let ListMode::Collecting { queue, .. } = &mut session.list {
            let name = parsed
                .as_ref()
                .ok()
                .and_then(|tokens| tokens.first())
                .map(String::as_str);
            return match name {
                Some("command_list_end") => self.run_list(session),
                Some(name @ ("command_list_begin" | "command_list_ok_begin")) => {
                    let dropped = queue.len();
                    session.list = ListMode::Off;
                    tracing::debug!(session = session.id, dropped, "nested command list rejected");
                    let ack = AckError::new(
                        AckCode::NotList,
                        name,
                        "nested command lists are not allowed",
                    );
                    Outcome::Respond(vec![Frame::Line(ack.to_string())])
                }
                _ => {
                    queue.push(parsed);
                    Outcome::Pending
                }
            };
        }

        let tokens = match parsed {
            Ok(tokens) => tokens,
            Err(ack) => return Outcome::Respond(vec![Frame::Line(ack.to_string())]),
        };
        match self.execute(session, &tokens, 0) {
            Ok(Reply::Done(response)) => {
                let mut frames = response.into_frames();
                frames.push(Frame::ok());
                Outcome::Respond(frames)
            }
            Ok(Reply::Idle(subsystems)) => Outcome::Idle(subsystems),
            Ok(Reply::BeginList { verbose }) => {
                session.list = ListMode::Collecting {
                    verbose,
                    queue: Vec::new(),
                };
                Outcome::Pending
            }
            Ok(Reply::Close) => Outcome::Close,
            Err(ack) => Outcome::Respond(vec![Frame::Line(ack.to_string())]),
        }
    }

    /// Runs the buffered list in order, stopping at the first failure.
    fn run_list(&self, session: &mut SessionState) -> Outcome {
        let (verbose, queue) = match std::mem::take(&mut session.list) {
            ListMode::Collecting { verbose, queue } => (verbose, queue),
            ListMode::Off => (false, Vec::new()),
        };
        tracing::debug!(session = session.id, commands = queue.len(), verbose, "running command list");

        let mut frames = Vec::new();
        for (offset, queued) in queue.into_iter().enumerate() {
            let index = offset + 1;
            let result = queued.and_then(|tokens| match self.execute(session, &tokens, index)? {
                Reply::Done(response) => Ok(response),
                _ => Err(AckError::new(
                    AckCode::NotList,
                    tokens.first().map(String::as_str).unwrap_or_default(),
                    "command not allowed in a command list",
                )),
            });
            match result {
                Ok(response) => {
                    frames.extend(response.into_frames());
                    if verbose {
                        frames.push(Frame::list_ok());
                    }
                }
                Err(ack) => {
                    frames.push(Frame::Line(ack.at_index(index).to_string()));
                    return Outcome::Respond(frames);
                }
            }
        }
        frames.push(Frame::ok());
        Outcome::Respond(frames)
    }

    /// Resolves, checks and runs one command. `index` is its 1-based list
    /// position, or 0 outside a list.
    fn execute(&self, session: &mut SessionState, tokens: &[String], index: usize) -> Result<Reply, AckError> {
        let (name, raw) = tokens.split_first().ok_or_else(AckError::no_command)?;
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| AckError::unknown_command(name))?;

        if spec.auth_required && !session.authenticated {
            return Err(AckError::permission(name));
        }
        if index > 0 && !spec.list_allowed {
            return Err(AckError::new(
                AckCode::NotList,
                name.as_str(),
                format!("\"{name}\" is not allowed in a command list"),
            ));
        }
        let args = spec.schema.validate(name, raw)?;

        tracing::trace!(session = session.id, command = %name, args = raw.len(), "dispatching");
        let mut ctx = Context {
            backend: &self.backend,
            session,
            settings: &self.settings,
            registry: &self.registry,
            uri_map: &self.uri_map,
            board: &self.board,
            notifier: self.notifier.as_ref(),
            started: self.started,
        };
        (spec.handler)(&mut ctx, &args).map_err(|ack| ack.for_command(name))
    }
}

fn first_word(line: &str) -> &str {
    line.split([' ', '\t']).find(|w| !w.is_empty()).unwrap_or_default()
}
