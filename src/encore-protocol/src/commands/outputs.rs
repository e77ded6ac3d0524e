use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("outputs", ArgSchema::NONE, outputs),
    CommandSpec::new("enableoutput", ArgSchema::new(&[ArgKind::Uint], &[]), enableoutput),
    CommandSpec::new("disableoutput", ArgSchema::new(&[ArgKind::Uint], &[]), disableoutput),
    CommandSpec::new("toggleoutput", ArgSchema::new(&[ArgKind::Uint], &[]), toggleoutput),
];

fn outputs(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for output in ctx.backend.outputs.list() {
        out.field("outputid", output.id)
            .field("outputname", &output.name)
            .field("outputenabled", u8::from(output.enabled));
    }
    Ok(out.into())
}

/// Sets output `id` to whatever `decide` returns given its current state.
fn switch(ctx: &Context<'_>, args: &Args, decide: fn(bool) -> bool) -> CommandResult {
    let id = u32::try_from(args.uint(0)?).map_err(|_| AckError::no_exist("No such audio output"))?;
    let output = ctx
        .backend
        .outputs
        .list()
        .into_iter()
        .find(|o| o.id == id)
        .ok_or_else(|| AckError::no_exist("No such audio output"))?;
    ctx.backend
        .outputs
        .set_enabled(id, decide(output.enabled))
        .map_err(|_| AckError::system("problems enabling output"))?;
    done()
}

fn enableoutput(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    switch(ctx, args, |_| true)
}

fn disableoutput(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    switch(ctx, args, |_| false)
}

fn toggleoutput(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    switch(ctx, args, |enabled| !enabled)
}
