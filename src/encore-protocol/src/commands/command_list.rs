//! Command list delimiters. While a list is open the dispatcher intercepts
//! these names itself, so the handlers only ever see the top level.

use crate::ack::AckError;
use crate::args::{ArgSchema, Args};
use crate::context::Context;
use crate::registry::{CommandResult, CommandSpec, Reply};

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("command_list_begin", ArgSchema::NONE, begin).not_in_list(),
    CommandSpec::new("command_list_ok_begin", ArgSchema::NONE, ok_begin).not_in_list(),
    CommandSpec::new("command_list_end", ArgSchema::NONE, end).not_in_list(),
];

fn begin(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(Reply::BeginList { verbose: false })
}

fn ok_begin(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(Reply::BeginList { verbose: true })
}

fn end(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Err(AckError::unknown_command("command_list_end"))
}
