use crate::args::{ArgSchema, Args};
use crate::context::Context;
use crate::registry::{CommandResult, CommandSpec};
use crate::response::Response;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("commands", ArgSchema::NONE, commands).public(),
    CommandSpec::new("notcommands", ArgSchema::NONE, notcommands).public(),
    CommandSpec::new("urlhandlers", ArgSchema::NONE, urlhandlers),
    CommandSpec::new("decoders", ArgSchema::NONE, decoders),
];

/// Names the session may (`allowed == true`) or may not run right now.
fn listing(ctx: &Context<'_>, allowed: bool) -> Response {
    let authenticated = ctx.session.authenticated;
    let mut out = Response::new();
    for spec in ctx.registry.sorted() {
        let runnable = authenticated || !spec.auth_required;
        if spec.listed && runnable == allowed {
            out.field("command", spec.name);
        }
    }
    out
}

fn commands(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(listing(ctx, true).into())
}

fn notcommands(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(listing(ctx, false).into())
}

fn urlhandlers(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for scheme in ctx.backend.library.uri_schemes() {
        out.field("handler", format!("{scheme}://"));
    }
    Ok(out.into())
}

/// No decoder plugins are exposed; the backend owns decoding.
fn decoders(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(Response::new().into())
}
