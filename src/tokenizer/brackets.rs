//! The open-bracket stack.
//!
//! Host-language brackets, subprocess literals and macro captures share one
//! stack of tagged entries because they interleave in source order:
//! `$(ls @(f(x)))` opens Subproc, Host, Host and must close them in reverse.

use super::error::TokenizeError;
use super::token::Position;

/// Which lexing rules apply inside a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Universe {
    /// Ordinary expression tokens.
    Host,
    /// Whitespace separated argument words.
    Subproc,
    /// Raw text, not tokenized at all.
    Macro,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    pub universe: Universe,
    pub opener: &'static str,
    pub closer: char,
    pub position: Position,
}

#[derive(Debug, Clone, Default)]
pub struct BracketStack {
    entries: Vec<Bracket>,
}

impl BracketStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the entry an opener pushes, given the universe it appears in.
    ///
    /// Plain brackets inherit the surrounding universe, so `$(echo (a b))`
    /// keeps splitting words inside the inner parentheses.
    pub fn classify(opener: &'static str, current: Universe, position: Position) -> Option<Bracket> {
        let (universe, closer) = match opener {
            "$(" | "!(" | "@$(" => (Universe::Subproc, ')'),
            "$[" | "![" => (Universe::Subproc, ']'),
            "@(" => (Universe::Host, ')'),
            "${" => (Universe::Host, '}'),
            "(" => (current, ')'),
            "[" => (current, ']'),
            "{" => (current, '}'),
            _ => return None,
        };
        Some(Bracket {
            universe,
            opener,
            closer,
            position,
        })
    }

    pub fn push(&mut self, bracket: Bracket) {
        self.entries.push(bracket);
    }

    /// Pop the innermost entry if `closer` closes it.
    pub fn pop_matching(&mut self, closer: char, position: Position) -> Result<Bracket, TokenizeError> {
        match self.entries.last() {
            Some(top) if top.closer == closer => self
                .entries
                .pop()
                .ok_or(TokenizeError::UnmatchedCloser {
                    found: closer,
                    position,
                }),
            Some(top) => Err(TokenizeError::MismatchedBracket {
                found: closer,
                opener: top.opener,
                position,
            }),
            None => Err(TokenizeError::UnmatchedCloser {
                found: closer,
                position,
            }),
        }
    }

    pub fn top(&self) -> Option<&Bracket> {
        self.entries.last()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The universe the next character belongs to.
    pub fn universe(&self) -> Universe {
        self.entries.last().map_or(Universe::Host, |b| b.universe)
    }

    pub fn in_argv(&self) -> bool {
        self.universe() == Universe::Subproc
    }
}
