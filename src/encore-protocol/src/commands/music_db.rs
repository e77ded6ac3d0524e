use crate::ack::AckError;
use crate::args::{ArgKind, ArgSchema, Args};
use crate::context::Context;
use crate::filter::{self, Filter};
use crate::format;
use crate::registry::{done, CommandResult, CommandSpec};
use crate::response::Response;
use encore_core::{SearchField, Tag, Track};
use std::collections::BTreeSet;

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("find", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), find),
    CommandSpec::new("search", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), search),
    CommandSpec::new("findadd", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), findadd),
    CommandSpec::new("searchadd", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), searchadd),
    CommandSpec::new("count", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), count),
    CommandSpec::new("list", ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text), list),
    CommandSpec::new("update", ArgSchema::new(&[], &[ArgKind::Uri]), update),
    CommandSpec::new("rescan", ArgSchema::new(&[], &[ArgKind::Uri]), update),
    CommandSpec::new("albumart", ArgSchema::new(&[ArgKind::Uri, ArgKind::Uint], &[]), albumart).binary(),
    CommandSpec::new("readpicture", ArgSchema::new(&[ArgKind::Uri, ArgKind::Uint], &[]), readpicture)
        .binary(),
];

/// Parses `TYPE VALUE [TYPE VALUE ...]` filter pairs.
fn filters(words: &[&str]) -> Result<Vec<(SearchField, String)>, AckError> {
    if words.len() % 2 != 0 {
        return Err(AckError::arg("incorrect arguments"));
    }
    words
        .chunks(2)
        .map(|pair| {
            let field = SearchField::parse(pair[0])
                .ok_or_else(|| AckError::arg("Unknown filter type"))?;
            Ok::<_, AckError>((field, pair[1].to_string()))
        })
        .collect()
}

/// A library query in either of its wire forms.
enum Query {
    Pairs(Vec<(SearchField, String)>),
    Expression(Filter),
}

fn query(words: &[&str], exact: bool) -> Result<Query, AckError> {
    match words {
        [expression] if filter::is_expression(expression) => {
            Ok(Query::Expression(filter::parse(expression, !exact)?))
        }
        _ => filters(words).map(Query::Pairs),
    }
}

fn run_query(ctx: &Context<'_>, query: Query, exact: bool) -> Result<Vec<Track>, AckError> {
    match query {
        Query::Pairs(pairs) => Ok(ctx.backend.library.search(&pairs, exact)?),
        Query::Expression(filter) => {
            let candidates = ctx.backend.library.search(&filter.pushdown(), exact)?;
            Ok(candidates.into_iter().filter(|t| filter.matches(t)).collect())
        }
    }
}

fn matching(ctx: &Context<'_>, args: &Args, exact: bool) -> Result<Vec<Track>, AckError> {
    let query = query(&args.texts_from(0), exact)?;
    run_query(ctx, query, exact)
}

fn render(ctx: &Context<'_>, tracks: &[Track]) -> Response {
    let mut out = Response::new();
    for track in tracks {
        format::track(&mut out, track, &ctx.session.tagtypes);
    }
    out
}

fn find(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let found = matching(ctx, args, true)?;
    Ok(render(ctx, &found).into())
}

fn search(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let found = matching(ctx, args, false)?;
    Ok(render(ctx, &found).into())
}

fn findadd(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let found = matching(ctx, args, true)?;
    ctx.backend.tracklist.add(found, None)?;
    done()
}

fn searchadd(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let found = matching(ctx, args, false)?;
    ctx.backend.tracklist.add(found, None)?;
    done()
}

fn count(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let found = matching(ctx, args, true)?;
    let playtime: u64 = found.iter().filter_map(|t| t.length_ms).sum::<u64>() / 1000;
    let mut out = Response::new();
    out.field("songs", found.len()).field("playtime", playtime);
    Ok(out.into())
}

fn list(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let tag = Tag::parse(args.text(0)?).ok_or_else(|| AckError::arg("Unknown tag type"))?;
    let rest = args.texts_from(1);
    let values = match rest.as_slice() {
        [expression] if filter::is_expression(expression) => {
            let found = run_query(ctx, query(&rest, true)?, true)?;
            let distinct: BTreeSet<String> = found.iter().filter_map(|t| t.tag(tag)).collect();
            distinct.into_iter().collect()
        }
        // legacy form: `list album <artist>`
        [artist] if tag == Tag::Album => {
            let query = [(SearchField::Tag(Tag::Artist), artist.to_string())];
            ctx.backend.library.distinct(tag, &query)?
        }
        _ => ctx.backend.library.distinct(tag, &filters(&rest)?)?,
    };
    let mut out = Response::new();
    for value in values {
        out.field(tag.name(), value);
    }
    Ok(out.into())
}

fn update(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let job = ctx.backend.library.refresh(args.opt_text(0))?;
    let mut out = Response::new();
    out.field("updating_db", job);
    Ok(out.into())
}

/// Slices one chunk of `image` starting at `offset`.
fn chunk(ctx: &Context<'_>, image: Vec<u8>, offset: u64) -> CommandResult {
    let size = image.len();
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    if offset > size {
        return Err(AckError::arg("Bad file offset"));
    }
    let end = size.min(offset.saturating_add(ctx.session.binary_limit));
    let mut out = Response::new();
    out.field("size", size).binary(image[offset..end].to_vec());
    Ok(out.into())
}

fn albumart(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    let image = ctx
        .backend
        .library
        .image(args.text(0)?)?
        .ok_or_else(|| AckError::no_exist("No file exists"))?;
    chunk(ctx, image, args.uint(1)?)
}

fn readpicture(ctx: &mut Context<'_>, args: &Args) -> CommandResult {
    match ctx.backend.library.image(args.text(0)?)? {
        Some(image) => chunk(ctx, image, args.uint(1)?),
        None => done(),
    }
}
