use crate::ack::{AckCode, AckError};
use crate::args::{ArgKind, ArgSchema, Args};
use crate::board::BoardError;
use crate::context::Context;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;
use crate::subsystem::Subsystem;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("subscribe", ArgSchema::new(&[ArgKind::Text], &[]), subscribe),
    CommandSpec::new("unsubscribe", ArgSchema::new(&[ArgKind::Text], &[]), unsubscribe),
    CommandSpec::new("channels", ArgSchema::NONE, channels),
    CommandSpec::new("readmessages", ArgSchema::NONE, readmessages),
    CommandSpec::new("sendmessage", ArgSchema::new(&[ArgKind::Text, ArgKind::Text], &[]), sendmessage),
];

impl From<BoardError> for AckError {
    fn from(err: BoardError) -> Self {
        let code = match err {
            BoardError::InvalidName => AckCode::Arg,
            BoardError::AlreadySubscribed => AckCode::Exist,
            BoardError::NotSubscribed | BoardError::NoSubscribers => AckCode::NoExist,
            BoardError::InboxesFull => AckCode::System,
        };
        AckError::bare(code, err.to_string())
    }
}

fn subscribe(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    ctx.board.subscribe(ctx.session.id, args.text(0)?)?;
    ctx.notifier.notify(Subsystem::Subscription);
    done()
}

fn unsubscribe(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    ctx.board.unsubscribe(ctx.session.id, args.text(0)?)?;
    ctx.notifier.notify(Subsystem::Subscription);
    done()
}

fn channels(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for channel in ctx.board.channels() {
        out.field("channel", channel);
    }
    Ok(out.into())
}

fn readmessages(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for message in ctx.board.take(ctx.session.id) {
        out.field("channel", message.channel)
            .field("message", message.text);
    }
    Ok(out.into())
}

fn sendmessage(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let delivered = ctx.board.send(args.text(0)?, args.text(1)?)?;
    tracing::trace!(session = ctx.session.id, delivered, "message sent");
    ctx.notifier.notify(Subsystem::Message);
    done()
}
