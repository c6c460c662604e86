//! Parse failures.
//!
//! Inside the parser a rule failing to match is not an error at all, it is
//! `Ok(None)`. [`ParseError`] is what aborts a parse: a tokenize failure or
//! a syntax error raised on purpose. The entry points turn either into a
//! [`SyntaxError`] pointing at the source.

use crate::tokenizer::{Position, TokenizeError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Indentation,
    Tokenize,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Indentation => "IndentationError",
            ErrorKind::Tokenize => "TokenizeError",
        })
    }
}

/// A located, user-facing error.
///
/// Positions are stored 0-based in the column and rendered 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("File \"{filename}\", line {}, column {}: {message}", start.line, start.column + 1)]
pub struct SyntaxError {
    pub kind: ErrorKind,
    pub message: String,
    pub filename: String,
    pub start: Position,
    pub end: Position,
    pub line_text: String,
}

impl SyntaxError {
    /// The error message followed by the offending line and a caret under
    /// the reported range.
    pub fn render(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self);
        let line = self.line_text.trim_end_matches(&['\n', '\r'][..]);
        if line.is_empty() {
            return out;
        }
        let width = if self.end.line == self.start.line && self.end.column > self.start.column {
            self.end.column - self.start.column
        } else {
            1
        };
        out.push_str("\n    ");
        out.push_str(line);
        out.push_str("\n    ");
        out.push_str(&" ".repeat(self.start.column));
        out.push_str(&"^".repeat(width));
        out
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    /// A memo entry was read back with a different result type than it was
    /// stored with: two rules share a [`RuleId`](super::runtime::RuleId).
    #[error("memo entry for rule `{rule}` holds a different result type")]
    MemoType { rule: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_one_based_columns() {
        let err = SyntaxError {
            kind: ErrorKind::Syntax,
            message: "invalid syntax".to_string(),
            filename: "<string>".to_string(),
            start: Position::new(2, 4),
            end: Position::new(2, 7),
            line_text: "x = foo bar\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "File \"<string>\", line 2, column 5: invalid syntax"
        );
        let rendered = err.render();
        assert!(rendered.starts_with("SyntaxError: File"));
        assert!(rendered.ends_with("\n    x = foo bar\n        ^^^"));
    }
}
