//! Per-command argument schemas and the typed values they produce.

use crate::ack::AckError;
use std::ops::Range;

/// What a single argument position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    /// Text without control characters.
    Uri,
    /// `[+-]?\d+`
    Int,
    /// `\d+`
    Uint,
    Float,
    /// Non-negative float.
    Ufloat,
    /// `0` or `1`.
    Bool,
    /// `N`, `N:` or `N:M` with `M > N`.
    Range,
}

/// A half-open span of queue or playlist positions; `end: None` runs to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl SongRange {
    /// The one position `pos`; `None` when `pos + 1` does not fit.
    pub fn single(pos: usize) -> Option<Self> {
        pos.checked_add(1).map(|end| Self {
            start: pos,
            end: Some(end),
        })
    }

    /// Clamps the range to a list of `len` items.
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let end = self.end.unwrap_or(len).min(len);
        self.start.min(end)..end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Text(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Range(SongRange),
}

/// Positional shape of a command: required kinds, then optional kinds, or a
/// repeated tail.
#[derive(Debug, Clone, Copy)]
pub struct ArgSchema {
    pub required: &'static [ArgKind],
    pub optional: &'static [ArgKind],
    pub rest: Option<ArgKind>,
}

impl ArgSchema {
    pub const NONE: ArgSchema = ArgSchema::new(&[], &[]);

    pub const fn new(required: &'static [ArgKind], optional: &'static [ArgKind]) -> Self {
        Self {
            required,
            optional,
            rest: None,
        }
    }

    pub const fn variadic(required: &'static [ArgKind], rest: ArgKind) -> Self {
        Self {
            required,
            optional: &[],
            rest: Some(rest),
        }
    }

    fn kind_at(&self, pos: usize) -> Option<ArgKind> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .nth(pos)
            .copied()
            .or(self.rest)
    }

    /// Checks arity, then converts every raw argument.
    pub fn validate(&self, command: &str, raw: &[String]) -> Result<Args, AckError> {
        let max = self.required.len() + self.optional.len();
        if raw.len() < self.required.len() || (self.rest.is_none() && raw.len() > max) {
            return Err(AckError::wrong_arity(command));
        }

        let values = raw
            .iter()
            .enumerate()
            .map(|(pos, value)| {
                let kind = self.kind_at(pos).ok_or_else(|| AckError::wrong_arity(command))?;
                parse(kind, value).ok_or_else(|| AckError::arg("incorrect arguments"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Args { values })
    }
}

pub fn parse_uint(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

pub fn parse_range(value: &str) -> Option<SongRange> {
    match value.split_once(':') {
        Some((start, end)) => {
            let start = usize::try_from(parse_uint(start)?).ok()?;
            if end.trim().is_empty() {
                return Some(SongRange { start, end: None });
            }
            let end = usize::try_from(parse_uint(end)?).ok()?;
            (end > start).then_some(SongRange {
                start,
                end: Some(end),
            })
        }
        None => {
            let start = usize::try_from(parse_uint(value)?).ok()?;
            SongRange::single(start)
        }
    }
}

fn parse(kind: ArgKind, value: &str) -> Option<Arg> {
    match kind {
        ArgKind::Text => Some(Arg::Text(value.to_string())),
        ArgKind::Uri => {
            (!value.chars().any(char::is_control)).then(|| Arg::Text(value.to_string()))
        }
        ArgKind::Int => value.parse().ok().map(Arg::Int),
        ArgKind::Uint => parse_uint(value).map(Arg::Uint),
        ArgKind::Float => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Arg::Float),
        ArgKind::Ufloat => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Arg::Float),
        ArgKind::Bool => match value {
            "0" => Some(Arg::Bool(false)),
            "1" => Some(Arg::Bool(true)),
            _ => None,
        },
        ArgKind::Range => parse_range(value).map(Arg::Range),
    }
}

/// Validated arguments, indexed by position after the command word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Arg>,
}

fn mismatch() -> AckError {
    AckError::arg("incorrect arguments")
}

impl Args {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn opt_text(&self, pos: usize) -> Option<&str> {
        match self.values.get(pos) {
            Some(Arg::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self, pos: usize) -> Result<&str, AckError> {
        self.opt_text(pos).ok_or_else(mismatch)
    }

    /// Every text argument from `pos` onwards.
    pub fn texts_from(&self, pos: usize) -> Vec<&str> {
        (pos..self.len()).filter_map(|i| self.opt_text(i)).collect()
    }

    pub fn opt_int(&self, pos: usize) -> Option<i64> {
        match self.values.get(pos) {
            Some(Arg::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn int(&self, pos: usize) -> Result<i64, AckError> {
        self.opt_int(pos).ok_or_else(mismatch)
    }

    pub fn opt_uint(&self, pos: usize) -> Option<u64> {
        match self.values.get(pos) {
            Some(Arg::Uint(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn uint(&self, pos: usize) -> Result<u64, AckError> {
        self.opt_uint(pos).ok_or_else(mismatch)
    }

    /// Unsigned argument as an index into a list.
    pub fn index(&self, pos: usize) -> Result<usize, AckError> {
        usize::try_from(self.uint(pos)?).map_err(|_| AckError::bad_song_index())
    }

    pub fn opt_index(&self, pos: usize) -> Result<Option<usize>, AckError> {
        if self.opt_uint(pos).is_some() {
            self.index(pos).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Unsigned argument as a queue entry id.
    pub fn id(&self, pos: usize) -> Result<u32, AckError> {
        u32::try_from(self.uint(pos)?).map_err(|_| AckError::no_such_song())
    }

    pub fn float(&self, pos: usize) -> Result<f64, AckError> {
        match self.values.get(pos) {
            Some(Arg::Float(value)) => Ok(*value),
            _ => Err(mismatch()),
        }
    }

    pub fn opt_bool(&self, pos: usize) -> Option<bool> {
        match self.values.get(pos) {
            Some(Arg::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bool(&self, pos: usize) -> Result<bool, AckError> {
        self.opt_bool(pos).ok_or_else(mismatch)
    }

    pub fn opt_range(&self, pos: usize) -> Option<SongRange> {
        match self.values.get(pos) {
            Some(Arg::Range(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn range(&self, pos: usize) -> Result<SongRange, AckError> {
        self.opt_range(pos).ok_or_else(mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[rstest]
    #[case("5", Some(SongRange { start: 5, end: Some(6) }))]
    #[case("5:", Some(SongRange { start: 5, end: None }))]
    #[case("2:7", Some(SongRange { start: 2, end: Some(7) }))]
    #[case("7:2", None)]
    #[case("3:3", None)]
    #[case("-1", None)]
    #[case(":4", None)]
    #[case("x", None)]
    #[case("18446744073709551615", None)]
    #[case("18446744073709551614", Some(SongRange { start: usize::MAX - 1, end: Some(usize::MAX) }))]
    #[case("18446744073709551615:", Some(SongRange { start: usize::MAX, end: None }))]
    fn ranges(#[case] value: &str, #[case] expected: Option<SongRange>) {
        assert_eq!(parse_range(value), expected);
    }

    #[test]
    fn range_resolution_clamps() {
        assert_eq!(SongRange { start: 2, end: None }.resolve(5), 2..5);
        assert_eq!(SongRange { start: 2, end: Some(9) }.resolve(5), 2..5);
        assert_eq!(SongRange::single(7).unwrap().resolve(5), 5..5);
        assert_eq!(SongRange::single(usize::MAX), None);
    }

    #[rstest]
    #[case(ArgKind::Uint, "12", true)]
    #[case(ArgKind::Uint, "+12", false)]
    #[case(ArgKind::Uint, "-1", false)]
    #[case(ArgKind::Int, "-1", true)]
    #[case(ArgKind::Int, "1.5", false)]
    #[case(ArgKind::Bool, "1", true)]
    #[case(ArgKind::Bool, "true", false)]
    #[case(ArgKind::Ufloat, "30.1", true)]
    #[case(ArgKind::Ufloat, "-0.5", false)]
    #[case(ArgKind::Float, "-20.1", true)]
    #[case(ArgKind::Float, "nan", false)]
    #[case(ArgKind::Uri, "local:track:a.mp3", true)]
    #[case(ArgKind::Uri, "bad\u{1}uri", false)]
    fn kinds(#[case] kind: ArgKind, #[case] value: &str, #[case] accepted: bool) {
        assert_eq!(parse(kind, value).is_some(), accepted);
    }

    #[test]
    fn arity_errors_name_the_command() {
        const SCHEMA: ArgSchema = ArgSchema::new(&[ArgKind::Uint], &[ArgKind::Text]);
        let err = SCHEMA.validate("seek", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ACK [2@0] {seek} wrong number of arguments for \"seek\""
        );
        assert!(SCHEMA.validate("seek", &raw(&["1", "a", "b"])).is_err());

        let args = SCHEMA.validate("seek", &raw(&["1", "a"])).unwrap();
        assert_eq!(args.uint(0).unwrap(), 1);
        assert_eq!(args.text(1).unwrap(), "a");
    }

    #[test]
    fn type_errors_are_incorrect_arguments() {
        const SCHEMA: ArgSchema = ArgSchema::new(&[ArgKind::Bool], &[]);
        let err = SCHEMA.validate("random", &raw(&["2"])).unwrap_err();
        assert_eq!(err.message, "incorrect arguments");
    }

    #[test]
    fn variadic_tail_accepts_any_count() {
        const SCHEMA: ArgSchema = ArgSchema::variadic(&[ArgKind::Text], ArgKind::Text);
        let args = SCHEMA
            .validate("find", &raw(&["artist", "x", "album", "y"]))
            .unwrap();
        assert_eq!(args.texts_from(1), vec!["x", "album", "y"]);
        assert!(SCHEMA.validate("find", &[]).is_err());
    }
}
