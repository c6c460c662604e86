//! Tokenize failures.

use super::token::Position;
use thiserror::Error;

/// Malformed input detected by the lexer. Tokenizing stops at the first one.
#[derive(Debug, Error)]
pub enum TokenizeError {
    /// A single or triple quoted string runs into the end of its line or of
    /// the input.
    #[error("unterminated string literal (detected at line {})", position.line)]
    UnterminatedString { position: Position },

    #[error("unterminated f-string literal (detected at line {})", position.line)]
    UnterminatedFString { position: Position },

    #[error("unterminated search path literal")]
    UnterminatedSearchPath { position: Position },

    /// Input ended after a line continuation backslash.
    #[error("unexpected EOF in multi-line statement")]
    EofInMultiLineStatement { position: Position },

    /// A closer that does not match the innermost open bracket.
    #[error("closing parenthesis '{found}' does not match opening parenthesis '{opener}'")]
    MismatchedBracket {
        found: char,
        opener: &'static str,
        position: Position,
    },

    /// A closer with nothing open.
    #[error("unmatched '{found}'")]
    UnmatchedCloser { found: char, position: Position },

    /// Input ended while a bracket was still open.
    #[error("'{opener}' was never closed")]
    UnclosedBracket {
        opener: &'static str,
        position: Position,
    },

    /// A dedent to a column that is not on the indentation stack.
    #[error("unindent does not match any outer indentation level")]
    Dedent { position: Position },

    #[error("expected an indented block after 'with!' statement")]
    ExpectedIndentedBlock { position: Position },

    #[error("error reading source: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TokenizeError {
    pub fn position(&self) -> Option<Position> {
        match self {
            TokenizeError::UnterminatedString { position }
            | TokenizeError::UnterminatedFString { position }
            | TokenizeError::UnterminatedSearchPath { position }
            | TokenizeError::EofInMultiLineStatement { position }
            | TokenizeError::MismatchedBracket { position, .. }
            | TokenizeError::UnmatchedCloser { position, .. }
            | TokenizeError::UnclosedBracket { position, .. }
            | TokenizeError::Dedent { position }
            | TokenizeError::ExpectedIndentedBlock { position } => Some(*position),
            TokenizeError::Io { .. } => None,
        }
    }

    /// Indentation problems are reported as `IndentationError` rather than
    /// plain syntax errors.
    pub fn is_indentation(&self) -> bool {
        matches!(
            self,
            TokenizeError::Dedent { .. } | TokenizeError::ExpectedIndentedBlock { .. }
        )
    }
}
