//! Commands clients may try that have no backing here: queue priorities
//! and ranges, volatile tags, stickers, and storage mounts. They parse their
//! arguments like any other command, then refuse.

use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::registry::{CommandResult, CommandSpec};

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("prio", ArgSchema::new(&[ArgKind::Uint, ArgKind::Range], &[]), refuse),
    CommandSpec::new("prioid", ArgSchema::variadic(&[], ArgKind::Text), refuse),
    CommandSpec::new("rangeid", ArgSchema::new(&[ArgKind::Uint, ArgKind::Range], &[]), refuse),
    CommandSpec::new(
        "addtagid",
        ArgSchema::new(&[ArgKind::Uint, ArgKind::Text, ArgKind::Text], &[]),
        refuse,
    ),
    CommandSpec::new("cleartagid", ArgSchema::new(&[ArgKind::Uint, ArgKind::Text], &[]), refuse),
    CommandSpec::new(
        "sticker",
        ArgSchema::new(
            &[ArgKind::Text, ArgKind::Text, ArgKind::Uri],
            &[ArgKind::Text, ArgKind::Text],
        ),
        refuse,
    )
    .not_in_list(),
    CommandSpec::new("mount", ArgSchema::new(&[ArgKind::Text, ArgKind::Uri], &[]), refuse),
    CommandSpec::new("unmount", ArgSchema::new(&[ArgKind::Text], &[]), refuse),
    CommandSpec::new("listmounts", ArgSchema::NONE, refuse),
    CommandSpec::new("listneighbors", ArgSchema::NONE, refuse),
];

fn refuse(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Err(AckError::not_implemented())
}
