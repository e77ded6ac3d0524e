use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::format;
use crate::registry::{done, CommandResult, CommandSpec, Reply};
use crate::response::Response;
use crate::subsystem::Subsystem;
use encore_core::PlaybackState;
use std::collections::BTreeSet;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("idle", ArgSchema::variadic(&[], ArgKind::Text), idle).not_in_list(),
    CommandSpec::new("noidle", ArgSchema::NONE, noidle).not_in_list(),
    CommandSpec::new("status", ArgSchema::NONE, status),
    CommandSpec::new("currentsong", ArgSchema::NONE, currentsong),
    CommandSpec::new("stats", ArgSchema::NONE, stats),
    CommandSpec::new("clearerror", ArgSchema::NONE, clearerror),
];

fn idle(_ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let names = args.texts_from(0);
    let subsystems: BTreeSet<Subsystem> = if names.is_empty() {
        Subsystem::ALL.into_iter().collect()
    } else {
        names
            .iter()
            .map(|name| name.parse::<Subsystem>().map_err(AckError::arg))
            .collect::<Result<BTreeSet<_>, AckError>>()?
    };
    Ok(Reply::Idle(subsystems))
}

/// Only reached when the session is not idling; the connection loop handles
/// the idling case.
fn noidle(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    done()
}

fn state_name(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "play",
        PlaybackState::Paused => "pause",
        PlaybackState::Stopped => "stop",
    }
}

fn status(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let backend = ctx.backend;
    let options = backend.tracklist.options();
    let state = backend.playback.state();
    let current = backend.playback.current();

    let mut out = Response::new();
    out.field(
        "volume",
        backend.mixer.volume().map_or(-1, i32::from),
    )
    .field("repeat", u8::from(options.repeat))
    .field("random", u8::from(options.random))
    .field("single", u8::from(options.single))
    .field("consume", u8::from(options.consume))
    .field("playlist", backend.tracklist.version())
    .field("playlistlength", backend.tracklist.length())
    .field("xfade", 0)
    .field("state", state_name(state));

    if let Some(current) = &current {
        if let Some(pos) = backend.tracklist.index_of(current.tlid) {
            out.field("song", pos).field("songid", current.tlid);
        }
    }
    if let Some(next) = backend.tracklist.next_tlid() {
        if let Some(pos) = backend.tracklist.index_of(next) {
            out.field("nextsong", pos).field("nextsongid", next);
        }
    }
    if let (PlaybackState::Playing | PlaybackState::Paused, Some(current)) = (state, &current) {
        let position = backend.playback.time_position_ms();
        let total = current.track.length_ms.unwrap_or(0);
        out.field("time", format!("{}:{}", position / 1000, total / 1000))
            .field("elapsed", format!("{:.3}", position as f64 / 1000.0))
            .field("bitrate", current.track.bitrate.unwrap_or(0));
    }
    Ok(out.into())
}

fn currentsong(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    if let Some(current) = ctx.backend.playback.current() {
        if let Some(pos) = ctx.backend.tracklist.index_of(current.tlid) {
            format::queued_track(&mut out, &current, pos, &ctx.session.tagtypes);
        }
    }
    Ok(out.into())
}

fn stats(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let library = ctx.backend.library.stats();
    let mut out = Response::new();
    out.field("artists", library.artists)
        .field("albums", library.albums)
        .field("songs", library.songs)
        .field("uptime", ctx.started.elapsed().as_secs())
        .field("db_playtime", library.db_playtime)
        .field("db_update", library.db_update)
        .field("playtime", 0);
    Ok(out.into())
}

fn clearerror(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    done()
}
