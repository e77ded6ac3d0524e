use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::format;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;
use encore_core::Playlist;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("listplaylists", ArgSchema::NONE, listplaylists),
    CommandSpec::new("listplaylist", ArgSchema::new(&[ArgKind::Text], &[]), listplaylist),
    CommandSpec::new("listplaylistinfo", ArgSchema::new(&[ArgKind::Text], &[]), listplaylistinfo),
    CommandSpec::new("load", ArgSchema::new(&[ArgKind::Text], &[ArgKind::Range]), load),
    CommandSpec::new("playlistadd", ArgSchema::new(&[ArgKind::Text, ArgKind::Uri], &[]), playlistadd),
    CommandSpec::new("playlistclear", ArgSchema::new(&[ArgKind::Text], &[]), playlistclear),
    CommandSpec::new("playlistdelete", ArgSchema::new(&[ArgKind::Text, ArgKind::Uint], &[]), playlistdelete),
    CommandSpec::new(
        "playlistmove",
        ArgSchema::new(&[ArgKind::Text, ArgKind::Uint, ArgKind::Uint], &[]),
        playlistmove,
    ),
    CommandSpec::new("rename", ArgSchema::new(&[ArgKind::Text, ArgKind::Text], &[]), rename),
    CommandSpec::new("rm", ArgSchema::new(&[ArgKind::Text], &[]), rm),
    CommandSpec::new("save", ArgSchema::new(&[ArgKind::Text], &[]), save),
];

fn check_name(name: &str) -> Result<(), AckError> {
    if name.contains(['/', '\n', '\r']) {
        return Err(AckError::arg(
            "playlist name is invalid: playlist names may not contain slashes, newlines or carriage returns",
        ));
    }
    Ok(())
}

/// Re-reads the backend's playlists and returns `(client name, uri, mtime)`.
fn refresh(ctx: &Context<'_>) -> Vec<(String, String, Option<i64>)> {
    ctx.backend
        .playlists
        .list()
        .into_iter()
        .filter(|info| !info.name.is_empty())
        .map(|info| {
            let name = ctx.uri_map.insert(&info.name, &info.uri);
            (name, info.uri, info.last_modified)
        })
        .collect()
}

fn lookup(ctx: &Context<'_>, name: &str) -> Option<Playlist> {
    let uri = ctx.uri_map.uri_for(name).or_else(|| {
        refresh(ctx);
        ctx.uri_map.uri_for(name)
    })?;
    ctx.backend.playlists.lookup(&uri)
}

fn existing(ctx: &Context<'_>, name: &str) -> Result<Playlist, AckError> {
    lookup(ctx, name).ok_or_else(|| AckError::no_exist("No such playlist"))
}

fn store(ctx: &Context<'_>, playlist: Playlist) -> Result<(), AckError> {
    ctx.backend.playlists.save(playlist)?;
    Ok(())
}

fn create(ctx: &Context<'_>, name: &str) -> Result<Playlist, AckError> {
    let playlist = ctx
        .backend
        .playlists
        .create(name, &ctx.settings.default_playlist_scheme)?;
    ctx.uri_map.insert(name, &playlist.uri);
    Ok(playlist)
}

fn listplaylists(ctx: &mut Context<'_>, _args: &Args) -> CommandResult {
    let mut out = Response::new();
    for (name, _, modified) in refresh(ctx) {
        let stamp = format::iso_timestamp(modified.unwrap_or(0)).unwrap_or_default();
        out.field("playlist", name).field("Last-Modified", stamp);
    }
    Ok(out.into())
}

fn listplaylist(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let playlist = existing(ctx, args.text(0)?)?;
    let mut out = Response::new();
    for track in &playlist.tracks {
        out.field("file", &track.uri);
    }
    Ok(out.into())
}

fn listplaylistinfo(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let playlist = existing(ctx, args.text(0)?)?;
    let mut out = Response::new();
    for track in &playlist.tracks {
        format::track(&mut out, track, &ctx.session.tagtypes);
    }
    Ok(out.into())
}

fn load(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let playlist = existing(ctx, args.text(0)?)?;
    let mut tracks = playlist.tracks;
    if let Some(range) = args.opt_range(1) {
        if range.start >= tracks.len() && !tracks.is_empty() {
            return Err(AckError::bad_song_index());
        }
        let span = range.resolve(tracks.len());
        tracks = tracks.drain(span).collect();
    }
    ctx.backend.tracklist.add(tracks, None)?;
    done()
}

fn playlistadd(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    let found = ctx.backend.library.lookup(args.text(1)?)?;
    if found.is_empty() {
        return Err(AckError::no_exist("directory or file not found"));
    }
    let mut playlist = match lookup(ctx, name) {
        Some(playlist) => playlist,
        None => create(ctx, name)?,
    };
    playlist.tracks.extend(found);
    store(ctx, playlist)?;
    done()
}

fn playlistclear(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    let mut playlist = existing(ctx, name)?;
    playlist.tracks.clear();
    store(ctx, playlist)?;
    done()
}

fn playlistdelete(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    let mut playlist = existing(ctx, name)?;
    let pos = args.index(1)?;
    if pos >= playlist.tracks.len() {
        return Err(AckError::bad_song_index());
    }
    playlist.tracks.remove(pos);
    store(ctx, playlist)?;
    done()
}

fn playlistmove(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    let mut playlist = existing(ctx, name)?;
    let (from, to) = (args.index(1)?, args.index(2)?);
    let len = playlist.tracks.len();
    if from >= len || to >= len {
        return Err(AckError::bad_song_index());
    }
    if from != to {
        let track = playlist.tracks.remove(from);
        playlist.tracks.insert(to, track);
        store(ctx, playlist)?;
    }
    done()
}

fn rename(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let (old_name, new_name) = (args.text(0)?, args.text(1)?);
    check_name(old_name)?;
    check_name(new_name)?;
    let old = existing(ctx, old_name)?;
    if lookup(ctx, new_name).is_some() {
        return Err(AckError::exist("Playlist already exists"));
    }
    let mut renamed = create(ctx, new_name)?;
    renamed.tracks = old.tracks;
    store(ctx, renamed)?;
    ctx.backend.playlists.delete(&old.uri)?;
    ctx.uri_map.forget(&old.uri);
    done()
}

fn rm(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    let playlist = existing(ctx, name)?;
    ctx.backend.playlists.delete(&playlist.uri)?;
    ctx.uri_map.forget(&playlist.uri);
    done()
}

fn save(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let name = args.text(0)?;
    check_name(name)?;
    if lookup(ctx, name).is_some() {
        return Err(AckError::exist("Playlist already exists"));
    }
    let mut playlist = create(ctx, name)?;
    playlist.tracks = ctx
        .backend
        .tracklist
        .tracks()
        .into_iter()
        .map(|entry| entry.track)
        .collect();
    store(ctx, playlist)?;
    done()
}
