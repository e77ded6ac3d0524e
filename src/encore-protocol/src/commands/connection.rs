use crate::ack::{AckCode, AckError};
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::registry::{done, CommandResult, CommandSpec, Reply};
use crate::response::Response;
use encore_core::Tag;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("close", ArgSchema::NONE, close)
        .public()
        .not_in_list(),
    CommandSpec::new("kill", ArgSchema::NONE, kill),
    CommandSpec::new("password", ArgSchema::new(&[ArgKind::Text], &[]), password).public(),
    CommandSpec::new("ping", ArgSchema::NONE, ping).public(),
    CommandSpec::new("tagtypes", ArgSchema::variadic(&[], ArgKind::Text), tagtypes),
    CommandSpec::new("binarylimit", ArgSchema::new(&[ArgKind::Uint], &[]), binarylimit),
];

/// Smallest chunk size a client may ask for.
const MIN_BINARY_LIMIT: usize = 64;

fn close(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Ok(Reply::Close)
}

fn kill(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    Err(AckError::permission("kill"))
}

fn password(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let given = args.text(0)?;
    match ctx.settings.password.as_deref() {
        Some(expected) if expected == given => {
            ctx.session.authenticated = true;
            tracing::debug!(session = ctx.session.id, "client authenticated");
            done()
        }
        Some(_) => Err(AckError::bare(AckCode::Password, "incorrect password")),
        // nothing to unlock
        None => done(),
    }
}

fn ping(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    done()
}

fn parse_tags(names: &[&str]) -> Result<Vec<Tag>, AckError> {
    names
        .iter()
        .map(|name| Tag::parse(name).ok_or_else(|| AckError::arg("Unknown tag type")))
        .collect()
}

fn tagtypes(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let words = args.texts_from(0);
    let Some((sub, names)) = words.split_first() else {
        let mut out = Response::new();
        for tag in &ctx.session.tagtypes {
            out.field("tagtype", tag.name());
        }
        return Ok(out.into());
    };

    match *sub {
        "all" => ctx.session.tagtypes = Tag::ALL.into_iter().collect(),
        "clear" => ctx.session.tagtypes.clear(),
        "enable" | "disable" => {
            if names.is_empty() {
                return Err(AckError::arg("Not enough arguments"));
            }
            let tags = parse_tags(names)?;
            for tag in tags {
                if *sub == "enable" {
                    ctx.session.tagtypes.insert(tag);
                } else {
                    ctx.session.tagtypes.remove(&tag);
                }
            }
        }
        _ => return Err(AckError::arg("Unknown sub command")),
    }
    done()
}

fn binarylimit(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let limit = usize::try_from(args.uint(0)?).unwrap_or(usize::MAX);
    if limit < MIN_BINARY_LIMIT {
        return Err(AckError::arg(format!("Value too small, minimum is {MIN_BINARY_LIMIT}")));
    }
    ctx.session.binary_limit = limit;
    done()
}
