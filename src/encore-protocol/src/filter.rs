//! Filter expressions as sent by protocol 0.21 clients:
//! `(artist == 'Miles Davis')`, `(!(album contains "blue"))`,
//! `((artist == 'x') AND (date =~ '^19'))`.
//!
//! Only conjunctions are supported; a negated group of several conditions is
//! rejected.

use crate::ack::AckError;
use chrono::DateTime;
use encore_core::{SearchField, Tag, Track};
use regex::{Regex, RegexBuilder};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("'(' expected")]
    OpenParen,
    #[error("')' expected")]
    CloseParen,
    #[error("'AND' expected")]
    AndExpected,
    #[error("Word expected")]
    WordExpected,
    #[error("invalid operator")]
    InvalidOperator,
    #[error("Quoted string expected")]
    QuoteExpected,
    #[error("Closing quote not found")]
    ClosingQuote,
    #[error("inverting (AND) not supported")]
    InvertedAnd,
    #[error("incomplete filter expression")]
    Incomplete,
    #[error("Unparsed garbage after expression")]
    Garbage,
    #[error("Unknown filter type")]
    UnknownField,
    #[error("Invalid regular expression")]
    BadPattern,
    #[error("Failed to parse time stamp")]
    BadTimestamp,
}

impl From<FilterError> for AckError {
    fn from(err: FilterError) -> Self {
        AckError::arg(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Regex,
    NotRegex,
    Contains,
    NotContains,
}

impl Operator {
    fn parse(word: &str) -> Option<Operator> {
        Some(match word {
            "==" => Operator::Eq,
            "!=" => Operator::NotEq,
            "=~" => Operator::Regex,
            "!~" => Operator::NotRegex,
            "contains" => Operator::Contains,
            "!contains" => Operator::NotContains,
            _ => return None,
        })
    }

    fn inverted(self) -> Operator {
        match self {
            Operator::Eq => Operator::NotEq,
            Operator::NotEq => Operator::Eq,
            Operator::Regex => Operator::NotRegex,
            Operator::NotRegex => Operator::Regex,
            Operator::Contains => Operator::NotContains,
            Operator::NotContains => Operator::Contains,
        }
    }

    fn negated(self) -> bool {
        matches!(self, Operator::NotEq | Operator::NotRegex | Operator::NotContains)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Field(SearchField),
    /// `(base 'dir')`: tracks at or below a URI.
    Base,
    /// `(modified-since 'when')`: unix seconds or RFC 3339.
    ModifiedSince,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub subject: Subject,
    pub op: Operator,
    pub value: String,
    pattern: Option<Regex>,
    since: i64,
}

/// A parsed expression: every condition must hold.
#[derive(Debug, Clone)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    fold_case: bool,
}

/// Parses `expression`. With `fold_case`, comparisons ignore case as
/// `search` does; otherwise they are exact as for `find`.
pub fn parse(expression: &str, fold_case: bool) -> Result<Filter, FilterError> {
    let mut cursor = Cursor {
        chars: expression.chars().peekable(),
    };
    cursor.skip_space();
    let raw = cursor.subexpression()?;
    if cursor.chars.peek().is_some() {
        return Err(FilterError::Garbage);
    }
    let conditions = raw
        .into_iter()
        .map(|(name, op, value)| Condition::new(&name, op, value, fold_case))
        .collect::<Result<_, _>>()?;
    Ok(Filter {
        conditions,
        fold_case,
    })
}

/// Whether an argument is an expression rather than a legacy `TYPE VALUE` pair.
pub fn is_expression(word: &str) -> bool {
    word.starts_with('(')
}

type RawCondition = (String, Operator, String);

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-' || c == '_'
}

fn is_operator_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '!' | '=' | '~')
}

impl Cursor<'_> {
    fn skip_space(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Result<char, FilterError> {
        self.chars.peek().copied().ok_or(FilterError::Incomplete)
    }

    fn take_char(&mut self) -> Result<char, FilterError> {
        let c = self.chars.next().ok_or(FilterError::Incomplete)?;
        self.skip_space();
        Ok(c)
    }

    fn take_word(&mut self, accept: fn(char) -> bool) -> String {
        let mut word = String::new();
        while let Some(c) = self.chars.next_if(|c| accept(*c)) {
            word.push(c);
        }
        self.skip_space();
        word
    }

    fn take_quoted(&mut self) -> Result<String, FilterError> {
        let quote = self.chars.next().ok_or(FilterError::Incomplete)?;
        if quote != '\'' && quote != '"' {
            return Err(FilterError::QuoteExpected);
        }
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(FilterError::ClosingQuote),
                Some(c) if c == quote => break,
                Some('\\') => value.push(self.chars.next().ok_or(FilterError::ClosingQuote)?),
                Some(c) => value.push(c),
            }
        }
        self.skip_space();
        Ok(value)
    }

    fn subexpression(&mut self) -> Result<Vec<RawCondition>, FilterError> {
        if self.take_char()? != '(' {
            return Err(FilterError::OpenParen);
        }
        let conditions = match self.peek()? {
            '!' => {
                self.take_char()?;
                let mut inner = self.subexpression()?;
                if inner.len() != 1 {
                    return Err(FilterError::InvertedAnd);
                }
                let (name, op, value) = inner.remove(0);
                vec![(name, op.inverted(), value)]
            }
            '(' => {
                let mut all = self.subexpression()?;
                while self.peek()? != ')' {
                    if !self.take_word(is_tag_char).eq_ignore_ascii_case("AND") {
                        return Err(FilterError::AndExpected);
                    }
                    all.extend(self.subexpression()?);
                }
                all
            }
            _ => {
                let name = self.take_word(is_tag_char);
                if name.is_empty() {
                    return Err(FilterError::WordExpected);
                }
                if name == "base" || name == "modified-since" {
                    let value = self.take_quoted()?;
                    vec![(name, Operator::Eq, value)]
                } else {
                    let op = self.take_word(is_operator_char).to_lowercase();
                    let op = Operator::parse(&op).ok_or(FilterError::InvalidOperator)?;
                    let value = self.take_quoted()?;
                    vec![(name, op, value)]
                }
            }
        };
        if self.take_char()? != ')' {
            return Err(FilterError::CloseParen);
        }
        Ok(conditions)
    }
}

fn parse_timestamp(value: &str) -> Result<i64, FilterError> {
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|when| when.timestamp())
        .map_err(|_| FilterError::BadTimestamp)
}

impl Condition {
    fn new(name: &str, op: Operator, value: String, fold_case: bool) -> Result<Self, FilterError> {
        let subject = match name {
            "base" => Subject::Base,
            "modified-since" => Subject::ModifiedSince,
            "filename" => Subject::Field(SearchField::File),
            other => Subject::Field(SearchField::parse(other).ok_or(FilterError::UnknownField)?),
        };
        let pattern = match op {
            Operator::Regex | Operator::NotRegex => Some(
                RegexBuilder::new(&value)
                    .case_insensitive(fold_case)
                    .build()
                    .map_err(|_| FilterError::BadPattern)?,
            ),
            _ => None,
        };
        let since = match subject {
            Subject::ModifiedSince => parse_timestamp(&value)?,
            _ => 0,
        };
        Ok(Self {
            subject,
            op,
            value,
            pattern,
            since,
        })
    }

    fn compare(&self, candidate: &str, fold_case: bool) -> bool {
        match self.op {
            Operator::Eq | Operator::NotEq if fold_case => {
                candidate.to_lowercase() == self.value.to_lowercase()
            }
            Operator::Eq | Operator::NotEq => candidate == self.value,
            Operator::Contains | Operator::NotContains if fold_case => {
                candidate.to_lowercase().contains(&self.value.to_lowercase())
            }
            Operator::Contains | Operator::NotContains => candidate.contains(&self.value),
            Operator::Regex | Operator::NotRegex => {
                self.pattern.as_ref().is_some_and(|re| re.is_match(candidate))
            }
        }
    }

    fn matches(&self, track: &Track, fold_case: bool) -> bool {
        let hit = match self.subject {
            Subject::Base => {
                let base = self.value.trim_end_matches('/');
                base.is_empty()
                    || track.uri == base
                    || track
                        .uri
                        .strip_prefix(base)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Subject::ModifiedSince => track.last_modified.is_some_and(|t| t >= self.since),
            Subject::Field(field) => {
                let values = field_values(track, field);
                // `(tag == '')` selects tracks without the tag.
                if values.is_empty() {
                    matches!(self.op, Operator::Eq | Operator::NotEq) && self.value.is_empty()
                } else {
                    values.iter().any(|v| self.compare(v, fold_case))
                }
            }
        };
        hit != self.op.negated()
    }
}

fn field_values(track: &Track, field: SearchField) -> Vec<String> {
    match field {
        SearchField::File => vec![track.uri.clone()],
        SearchField::Tag(tag) => track.tag(tag).into_iter().collect(),
        SearchField::Any => std::iter::once(track.uri.clone())
            .chain(Tag::ALL.iter().filter_map(|tag| track.tag(*tag)))
            .collect(),
    }
}

impl Filter {
    pub fn matches(&self, track: &Track) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(track, self.fold_case))
    }

    /// The conditions a backend `search` can evaluate itself. The backend
    /// narrows the candidates; [`Filter::matches`] still has the final say.
    pub fn pushdown(&self) -> Vec<(SearchField, String)> {
        self.conditions
            .iter()
            .filter_map(|condition| {
                let Subject::Field(field) = condition.subject else {
                    return None;
                };
                let pushable = match condition.op {
                    Operator::Eq => !condition.value.is_empty(),
                    Operator::Contains => self.fold_case,
                    _ => false,
                };
                pushable.then(|| (field, condition.value.clone()))
            })
            .collect()
    }
}
