//! Shell language parser
//!
//! This module turns a token stream into an AST:
//! - [`runtime`]: the packrat machinery (mark/reset, memoization, left
//!   recursion, cut, two-pass error reporting)
//! - `statements`, `expressions`, `literals`, `subproc`: the grammar, as
//!   methods on [`runtime::Parser`]
//! - `invalid`: diagnostic rules that only run on the second pass
//! - [`ast`]: AST node definitions
//! - [`error`]: [`error::SyntaxError`] and the internal [`error::ParseError`]
//!
//! # Language
//!
//! Python 3 statements and expressions, plus:
//! - subprocess literals `$(...)`, `$[...]`, `!(...)`, `![...]`, `@$(...)`
//! - environment lookups `$NAME` and `${expr}`
//! - `@(expr)` and `@$(cmd)` inside subprocess arguments
//! - path strings `p"..."` and backtick search paths
//! - call macros `name!(raw, args)`, `cmd ! raw text` and `with!` blocks
//! - help postfixes `x?` and `x??`
//!
//! # Entry points
//!
//! [`parse_string`] and [`parse_file`] pick the start rule from
//! [`runtime::ParserOptions::mode`].

pub mod ast;
pub mod error;
mod expressions;
mod invalid;
pub mod literals;
pub mod runtime;
mod statements;
mod subproc;

use crate::tokenizer::{Lexer, Position, Tokenizer};
use ast::Ast;
use error::{ErrorKind, SyntaxError};
use runtime::{Mode, Parser, ParserOptions};
use std::path::Path;
use tracing::debug;

impl Parser {
    /// Parse the whole input with the start rule for the configured mode.
    pub fn parse_ast(&mut self) -> Result<Ast, SyntaxError> {
        let result = match self.options().mode {
            Mode::Exec => self.parse(Parser::file).map(Ast::Module),
            Mode::Eval => self.parse(Parser::eval).map(Ast::Expression),
        };
        let stats = self.stats();
        debug!(
            memo_entries = self.memo_len(),
            hits = stats.hits,
            misses = stats.misses,
            grow_steps = stats.grow_steps,
            ok = result.is_ok(),
            "parse finished"
        );
        result
    }
}

/// A parser over in-memory source.
pub fn parser_for_string(source: &str, options: ParserOptions) -> Parser {
    let lexer = Lexer::new(source).with_tabsize(options.tabsize);
    Parser::new(Tokenizer::new(lexer), options)
}

/// A parser streaming `path`. The file name is used in error messages
/// unless the options already name one.
pub fn parser_for_file(path: &Path, mut options: ParserOptions) -> Result<Parser, SyntaxError> {
    if options.filename == ParserOptions::default().filename {
        options.filename = path.display().to_string();
    }
    match Tokenizer::from_path(path, options.tabsize) {
        Ok(tokenizer) => Ok(Parser::new(tokenizer, options)),
        Err(err) => Err(SyntaxError {
            kind: ErrorKind::Tokenize,
            message: err.to_string(),
            filename: options.filename,
            start: Position::default(),
            end: Position::default(),
            line_text: String::new(),
        }),
    }
}

pub fn parse_string(source: &str, options: ParserOptions) -> Result<Ast, SyntaxError> {
    parser_for_string(source, options).parse_ast()
}

pub fn parse_file(path: &Path, options: ParserOptions) -> Result<Ast, SyntaxError> {
    parser_for_file(path, options)?.parse_ast()
}
