//! Splits one request line into a command word and its arguments.
//!
//! The command word matches `[a-z][a-z0-9_]*`. Arguments are separated by
//! spaces or tabs and are either bare (no quote, backslash or whitespace) or
//! wrapped in double quotes, where a backslash makes the next character
//! literal. Everything else, control characters included, is kept verbatim.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("Letter expected")]
    LetterExpected,
    #[error("Invalid word character")]
    InvalidWordCharacter,
    #[error("Missing closing '\"'")]
    MissingClosingQuote,
    #[error("Space expected after closing '\"'")]
    SpaceExpected,
    #[error("Invalid unquoted character")]
    InvalidUnquotedCharacter,
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Tokenizes `line`, which must already be stripped of its terminator.
///
/// A blank line yields no tokens; the caller decides what that means.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    if line.chars().all(is_separator) {
        return Ok(Vec::new());
    }

    let mut chars = line.chars().peekable();
    let mut word = String::new();
    match chars.peek() {
        Some(c) if c.is_ascii_lowercase() => {}
        Some(c) if is_separator(*c) => return Err(TokenizeError::LetterExpected),
        _ => return Err(TokenizeError::InvalidWordCharacter),
    }
    while let Some(&c) = chars.peek() {
        if is_separator(c) {
            break;
        }
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(TokenizeError::InvalidWordCharacter);
        }
        word.push(c);
        chars.next();
    }

    let mut tokens = vec![word];
    loop {
        while chars.next_if(|c| is_separator(*c)).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => return Err(TokenizeError::MissingClosingQuote),
                    },
                    other => token.push(other),
                }
            }
            if !closed {
                return Err(TokenizeError::MissingClosingQuote);
            }
            if chars.peek().is_some_and(|c| !is_separator(*c)) {
                return Err(TokenizeError::SpaceExpected);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !is_separator(*c)) {
                if c == '"' || c == '\\' {
                    return Err(TokenizeError::InvalidUnquotedCharacter);
                }
                token.push(c);
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Quotes `value` so that [`tokenize`] gives it back unchanged.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
