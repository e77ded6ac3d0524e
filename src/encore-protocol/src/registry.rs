use crate::ack::AckError;
use crate::args::{ArgSchema, Args};
use crate::commands;
use crate::context::Context;
use crate::response::Response;
use crate::subsystem::Subsystem;
use std::collections::{BTreeSet, HashMap};

/// What a handler asks the session to do next.
#[derive(Debug)]
pub enum Reply {
    Done(Response),
    /// Park until one of these subsystems changes.
    Idle(BTreeSet<Subsystem>),
    /// Start buffering a command list.
    BeginList { verbose: bool },
    Close,
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Done(response)
    }
}

pub type CommandResult = Result<Reply, AckError>;

pub type Handler = fn(&mut Context<'_>, &Args) -> CommandResult;

/// Shorthand for handlers with an empty body.
pub fn done() -> CommandResult {
    Ok(Reply::Done(Response::new()))
}

/// Static description of one protocol command.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub auth_required: bool,
    pub list_allowed: bool,
    /// Shown by `commands`/`notcommands`.
    pub listed: bool,
    /// Replies carry a binary chunk.
    pub binary: bool,
    pub schema: ArgSchema,
    pub handler: Handler,
}

impl CommandSpec {
    pub const fn new(name: &'static str, schema: ArgSchema, handler: Handler) -> Self {
        Self {
            name,
            auth_required: true,
            list_allowed: true,
            listed: true,
            binary: false,
            schema,
            handler,
        }
    }

    pub const fn public(mut self) -> Self {
        self.auth_required = false;
        self
    }

    pub const fn not_in_list(mut self) -> Self {
        self.list_allowed = false;
        self
    }

    pub const fn unlisted(mut self) -> Self {
        self.listed = false;
        self
    }

    pub const fn binary(mut self) -> Self {
        self.binary = true;
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("auth_required", &self.auth_required)
            .field("list_allowed", &self.list_allowed)
            .field("listed", &self.listed)
            .field("binary", &self.binary)
            .finish()
    }
}

/// Name to command lookup, fixed after construction.
#[derive(Debug)]
pub struct Registry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl Registry {
    /// Every built-in command except the blacklisted ones.
    pub fn builtin(blacklist: &[String]) -> Self {
        let commands = commands::catalog()
            .filter(|spec| !blacklist.iter().any(|name| name == spec.name))
            .map(|spec| (spec.name, *spec))
            .collect();
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in name order.
    pub fn sorted(&self) -> Vec<&CommandSpec> {
        let mut specs: Vec<_> = self.commands.values().collect();
        specs.sort_by_key(|spec| spec.name);
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in commands::catalog() {
            assert!(seen.insert(spec.name), "duplicate command {}", spec.name);
        }
        assert_eq!(Registry::builtin(&[]).len(), seen.len());
    }

    #[test]
    fn blacklisted_commands_are_absent() {
        let registry = Registry::builtin(&["rm".to_string(), "update".to_string()]);
        assert!(registry.get("rm").is_none());
        assert!(registry.get("update").is_none());
        assert!(registry.get("play").is_some());
    }

    #[test]
    fn exemptions_and_list_rules() {
        let registry = Registry::builtin(&[]);
        for name in ["password", "ping", "close", "commands", "notcommands"] {
            assert!(!registry.get(name).unwrap().auth_required, "{name}");
        }
        assert!(registry.get("play").unwrap().auth_required);
        for name in ["idle", "noidle", "command_list_begin", "close", "sticker"] {
            assert!(!registry.get(name).unwrap().list_allowed, "{name}");
        }
        assert!(registry.get("albumart").unwrap().binary);
    }
}
