use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;
use encore_core::{PlaybackOptions, PlaybackState};

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("consume", ArgSchema::new(&[ArgKind::Bool], &[]), consume),
    CommandSpec::new("random", ArgSchema::new(&[ArgKind::Bool], &[]), random),
    CommandSpec::new("repeat", ArgSchema::new(&[ArgKind::Bool], &[]), repeat),
    CommandSpec::new("single", ArgSchema::new(&[ArgKind::Bool], &[]), single),
    CommandSpec::new("setvol", ArgSchema::new(&[ArgKind::Int], &[]), setvol),
    CommandSpec::new("volume", ArgSchema::new(&[ArgKind::Int], &[]), volume),
    CommandSpec::new("getvol", ArgSchema::NONE, getvol),
    CommandSpec::new("replay_gain_status", ArgSchema::NONE, replay_gain_status),
    CommandSpec::new("play", ArgSchema::new(&[], &[ArgKind::Int]), play),
    CommandSpec::new("playid", ArgSchema::new(&[], &[ArgKind::Int]), playid),
    CommandSpec::new("pause", ArgSchema::new(&[], &[ArgKind::Bool]), pause),
    CommandSpec::new("stop", ArgSchema::NONE, stop),
    CommandSpec::new("next", ArgSchema::NONE, next),
    CommandSpec::new("previous", ArgSchema::NONE, previous),
    CommandSpec::new("seek", ArgSchema::new(&[ArgKind::Uint, ArgKind::Ufloat], &[]), seek),
    CommandSpec::new("seekid", ArgSchema::new(&[ArgKind::Uint, ArgKind::Ufloat], &[]), seekid),
    CommandSpec::new("seekcur", ArgSchema::new(&[ArgKind::Text], &[]), seekcur),
];

fn set_option(ctx: &Context<'_>, apply: impl FnOnce(&mut PlaybackOptions)) -> CommandResult {
    let mut options = ctx.backend.tracklist.options();
    apply(&mut options);
    ctx.backend.tracklist.set_options(options)?;
    done()
}

fn consume(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let on = args.bool(0)?;
    set_option(ctx, |o| o.consume = on)
}

fn random(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let on = args.bool(0)?;
    set_option(ctx, |o| o.random = on)
}

fn repeat(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let on = args.bool(0)?;
    set_option(ctx, |o| o.repeat = on)
}

fn single(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let on = args.bool(0)?;
    set_option(ctx, |o| o.single = on)
}

fn apply_volume(ctx: &Context<'_>, volume: i64) -> CommandResult {
    let clamped = u8::try_from(volume.clamp(0, 100)).unwrap_or(100);
    ctx.backend
        .mixer
        .set_volume(clamped)
        .map_err(|_| AckError::system("problems setting volume"))?;
    done()
}

fn setvol(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    apply_volume(ctx, args.int(0)?)
}

fn volume(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let change = args.int(0)?;
    if !(-100..=100).contains(&change) {
        return Err(AckError::arg("Invalid volume value"));
    }
    let current = ctx
        .backend
        .mixer
        .volume()
        .ok_or_else(|| AckError::system("problems setting volume"))?;
    apply_volume(ctx, i64::from(current) + change)
}

fn getvol(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    if let Some(volume) = ctx.backend.mixer.volume() {
        out.field("volume", volume);
    }
    Ok(out.into())
}

fn replay_gain_status(_ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    out.field("replay_gain_mode", "off");
    Ok(out.into())
}

/// `play -1`/`playid -1`: resume when paused, otherwise start the current
/// or first entry.
fn resume_or_start(ctx: &Context<'_>) -> CommandResult {
    let playback = &ctx.backend.playback;
    match playback.state() {
        PlaybackState::Playing => {}
        PlaybackState::Paused => playback.resume()?,
        PlaybackState::Stopped => {
            if ctx.backend.tracklist.length() > 0 {
                playback.play(None)?;
            }
        }
    }
    done()
}

fn play(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let pos = match args.opt_int(0) {
        None => return resume_or_start(ctx),
        Some(pos) if pos < 0 => return resume_or_start(ctx),
        Some(pos) => usize::try_from(pos).map_err(|_| AckError::bad_song_index())?,
    };
    let entry = ctx
        .backend
        .tracklist
        .tracks()
        .into_iter()
        .nth(pos)
        .ok_or_else(AckError::bad_song_index)?;
    ctx.backend.playback.play(Some(entry.tlid))?;
    done()
}

fn playid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tlid = match args.opt_int(0) {
        None => return resume_or_start(ctx),
        Some(id) if id < 0 => return resume_or_start(ctx),
        Some(id) => u32::try_from(id).map_err(|_| AckError::no_such_song())?,
    };
    if ctx.backend.tracklist.index_of(tlid).is_none() {
        return Err(AckError::no_such_song());
    }
    ctx.backend.playback.play(Some(tlid))?;
    done()
}

fn pause(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let playback = &ctx.backend.playback;
    let state = playback.state();
    let want_paused = match args.opt_bool(0) {
        Some(flag) => flag,
        None => state == PlaybackState::Playing,
    };
    match (want_paused, state) {
        (true, PlaybackState::Playing) => playback.pause()?,
        (false, PlaybackState::Paused) => playback.resume()?,
        _ => {}
    }
    done()
}

fn stop(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    ctx.backend.playback.stop()?;
    done()
}

fn next(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    ctx.backend.playback.next()?;
    done()
}

fn previous(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    ctx.backend.playback.previous()?;
    done()
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Makes `tlid` the playing entry, then seeks within it.
fn seek_entry(ctx: &Context<'_>, tlid: u32, seconds: f64) -> CommandResult {
    let playback = &ctx.backend.playback;
    if playback.current().map(|c| c.tlid) != Some(tlid) {
        playback.play(Some(tlid))?;
    }
    playback.seek(seconds_to_ms(seconds))?;
    done()
}

fn seek(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let pos = args.index(0)?;
    let seconds = args.float(1)?;
    let entry = ctx
        .backend
        .tracklist
        .tracks()
        .into_iter()
        .nth(pos)
        .ok_or_else(AckError::bad_song_index)?;
    seek_entry(ctx, entry.tlid, seconds)
}

fn seekid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tlid = args.id(0)?;
    let seconds = args.float(1)?;
    if ctx.backend.tracklist.index_of(tlid).is_none() {
        return Err(AckError::no_such_song());
    }
    seek_entry(ctx, tlid, seconds)
}

fn seekcur(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let raw = args.text(0)?;
    let value: f64 = raw
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| AckError::arg("incorrect arguments"))?;
    let playback = &ctx.backend.playback;
    let target = if raw.starts_with('+') || raw.starts_with('-') {
        playback.time_position_ms() as f64 / 1000.0 + value
    } else {
        value
    };
    playback.seek(seconds_to_ms(target))?;
    done()
}
