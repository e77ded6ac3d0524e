//! Only the `default` partition exists; these commands let partition-aware
//! clients discover that.

use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;

const DEFAULT_PARTITION: &str = "default";

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("partition", ArgSchema::new(&[ArgKind::Text], &[]), partition),
    CommandSpec::new("listpartitions", ArgSchema::NONE, listpartitions),
];

fn partition(_ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    if args.text(0)? != DEFAULT_PARTITION {
        return Err(AckError::no_exist("partition does not exist"));
    }
    done()
}

fn listpartitions(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    out.field("partition", DEFAULT_PARTITION);
    Ok(out.into())
}
