use crate::ack::AckError;
use crate::args::{parse_range, ArgKind, ArgSchema, Args, SongRange};
use crate::context::Context;
use crate::filter;
use crate::format;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;
use encore_core::{SearchField, TlTrack};

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("add", ArgSchema::new(&[ArgKind::Uri], &[ArgKind::Uint]), add),
    CommandSpec::new("addid", ArgSchema::new(&[ArgKind::Uri], &[ArgKind::Uint]), addid),
    CommandSpec::new("clear", ArgSchema::NONE, clear),
    CommandSpec::new("delete", ArgSchema::new(&[ArgKind::Range], &[]), delete),
    CommandSpec::new("deleteid", ArgSchema::new(&[ArgKind::Uint], &[]), deleteid),
    CommandSpec::new("move", ArgSchema::new(&[ArgKind::Range, ArgKind::Uint], &[]), move_),
    CommandSpec::new("moveid", ArgSchema::new(&[ArgKind::Uint, ArgKind::Uint], &[]), moveid),
    CommandSpec::new("playlist", ArgSchema::NONE, playlist),
    CommandSpec::new("playlistinfo", ArgSchema::new(&[], &[ArgKind::Text]), playlistinfo),
    CommandSpec::new("playlistid", ArgSchema::new(&[], &[ArgKind::Uint]), playlistid),
    CommandSpec::new("playlistfind", ArgSchema::new(&[ArgKind::Text], &[ArgKind::Text]), playlistfind),
    CommandSpec::new("playlistsearch", ArgSchema::new(&[ArgKind::Text], &[ArgKind::Text]), playlistsearch),
    CommandSpec::new("plchanges", ArgSchema::new(&[ArgKind::Int], &[]), plchanges),
    CommandSpec::new("plchangesposid", ArgSchema::new(&[ArgKind::Int], &[]), plchangesposid),
    CommandSpec::new("shuffle", ArgSchema::new(&[], &[ArgKind::Range]), shuffle),
    CommandSpec::new("swap", ArgSchema::new(&[ArgKind::Uint, ArgKind::Uint], &[]), swap),
    CommandSpec::new("swapid", ArgSchema::new(&[ArgKind::Uint, ArgKind::Uint], &[]), swapid),
];

fn insert(ctx: &Context<'_>, uri: &str, at: Option<usize>, missing: &str) -> Result<Vec<TlTrack>, AckError> {
    if at.is_some_and(|pos| pos > ctx.backend.tracklist.length()) {
        return Err(AckError::bad_song_index());
    }
    let tracks = ctx.backend.library.lookup(uri)?;
    if tracks.is_empty() {
        return Err(AckError::no_exist(missing));
    }
    Ok(ctx.backend.tracklist.add(tracks, at)?)
}

fn add(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    insert(ctx, args.text(0)?, args.opt_index(1)?, "directory or file not found")?;
    done()
}

fn addid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let added = insert(ctx, args.text(0)?, args.opt_index(1)?, "No such song")?;
    let mut out = Response::new();
    if let Some(first) = added.first() {
        out.field("Id", first.tlid);
    }
    Ok(out.into())
}

fn clear(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    ctx.backend.tracklist.clear()?;
    done()
}

fn tlid_position(ctx: &Context<'_>, tlid: u32) -> Result<usize, AckError> {
    ctx.backend
        .tracklist
        .index_of(tlid)
        .ok_or_else(AckError::no_such_song)
}

/// Entries covered by `range`; the start must exist.
fn entries_in(tracks: &[TlTrack], range: SongRange) -> Result<&[TlTrack], AckError> {
    if range.start >= tracks.len() {
        return Err(AckError::bad_song_index());
    }
    Ok(&tracks[range.resolve(tracks.len())])
}

fn delete(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tracks = ctx.backend.tracklist.tracks();
    let doomed: Vec<u32> = entries_in(&tracks, args.range(0)?)?
        .iter()
        .map(|t| t.tlid)
        .collect();
    ctx.backend.tracklist.remove(&doomed)?;
    done()
}

fn deleteid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tlid = args.id(0)?;
    tlid_position(ctx, tlid)?;
    ctx.backend.tracklist.remove(&[tlid])?;
    done()
}

fn move_(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let len = ctx.backend.tracklist.length();
    let range = args.range(0)?;
    if range.start >= len {
        return Err(AckError::bad_song_index());
    }
    let span = range.resolve(len);
    let to = args.index(1)?;
    match to.checked_add(span.len()) {
        Some(end) if end <= len => {}
        _ => return Err(AckError::bad_song_index()),
    }
    ctx.backend.tracklist.move_range(span, to)?;
    done()
}

fn moveid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let from = tlid_position(ctx, args.id(0)?)?;
    let to = args.index(1)?;
    if to >= ctx.backend.tracklist.length() {
        return Err(AckError::bad_song_index());
    }
    ctx.backend.tracklist.move_range(from..from + 1, to)?;
    done()
}

fn playlist(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for (pos, entry) in ctx.backend.tracklist.tracks().iter().enumerate() {
        out.line(format!("{pos}:file: {}", entry.track.uri));
    }
    Ok(out.into())
}

fn render(ctx: &Context<'_>, entries: &[TlTrack], first_pos: usize) -> Response {
    let mut out = Response::new();
    for (offset, entry) in entries.iter().enumerate() {
        format::queued_track(&mut out, entry, first_pos + offset, &ctx.session.tagtypes);
    }
    out
}

fn playlistinfo(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tracks = ctx.backend.tracklist.tracks();
    match args.opt_text(0) {
        None | Some("-1") => Ok(render(ctx, &tracks, 0).into()),
        Some(raw) => {
            let range = parse_range(raw).ok_or_else(|| AckError::arg("incorrect arguments"))?;
            let entries = entries_in(&tracks, range)?;
            Ok(render(ctx, entries, range.start).into())
        }
    }
}

fn playlistid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tracks = ctx.backend.tracklist.tracks();
    if args.opt_uint(0).is_none() {
        return Ok(render(ctx, &tracks, 0).into());
    }
    let tlid = args.id(0)?;
    let pos = tracks
        .iter()
        .position(|entry| entry.tlid == tlid)
        .ok_or_else(AckError::no_such_song)?;
    Ok(render(ctx, &tracks[pos..=pos], pos).into())
}

fn queue_matches(ctx: &Context<'_>, args: &Args, exact: bool) -> Result<Response, AckError> {
    let first = args.text(0)?;
    let test: Box<dyn Fn(&TlTrack) -> bool> = match args.opt_text(1) {
        None if filter::is_expression(first) => {
            let filter = filter::parse(first, !exact)?;
            Box::new(move |entry: &TlTrack| filter.matches(&entry.track))
        }
        None => return Err(AckError::arg("incorrect arguments")),
        Some(needle) => {
            let field = SearchField::parse(first)
                .ok_or_else(|| AckError::arg("Unknown filter type"))?;
            let needle = needle.to_string();
            Box::new(move |entry: &TlTrack| field.matches(&entry.track, &needle, exact))
        }
    };
    let mut out = Response::new();
    for (pos, entry) in ctx.backend.tracklist.tracks().iter().enumerate() {
        if test(entry) {
            format::queued_track(&mut out, entry, pos, &ctx.session.tagtypes);
        }
    }
    Ok(out)
}

fn playlistfind(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    Ok(queue_matches(ctx, args, true)?.into())
}

fn playlistsearch(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    Ok(queue_matches(ctx, args, false)?.into())
}

/// Everything changed since `version`. Positions are not tracked per
/// version, so any older version gets the whole queue.
fn changed_since(ctx: &Context<'_>, version: i64) -> Vec<TlTrack> {
    if version < i64::from(ctx.backend.tracklist.version()) {
        ctx.backend.tracklist.tracks()
    } else {
        Vec::new()
    }
}

fn plchanges(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let changed = changed_since(ctx, args.int(0)?);
    Ok(render(ctx, &changed, 0).into())
}

fn plchangesposid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let mut out = Response::new();
    for (pos, entry) in changed_since(ctx, args.int(0)?).iter().enumerate() {
        out.field("cpos", pos).field("Id", entry.tlid);
    }
    Ok(out.into())
}

fn shuffle(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let range = match args.opt_range(0) {
        Some(range) => {
            let len = ctx.backend.tracklist.length();
            if range.start >= len {
                return Err(AckError::bad_song_index());
            }
            Some(range.resolve(len))
        }
        None => None,
    };
    ctx.backend.tracklist.shuffle(range)?;
    done()
}

fn swap(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let (a, b) = (args.index(0)?, args.index(1)?);
    let len = ctx.backend.tracklist.length();
    if a >= len || b >= len {
        return Err(AckError::bad_song_index());
    }
    ctx.backend.tracklist.swap(a, b)?;
    done()
}

fn swapid(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let a = tlid_position(ctx, args.id(0)?)?;
    let b = tlid_position(ctx, args.id(1)?)?;
    ctx.backend.tracklist.swap(a, b)?;
    done()
}
