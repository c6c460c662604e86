//! # Introduction
//!
//! `xonsh-parser` tokenizes and parses the xonsh shell language: Python 3
//! extended with subprocess literals, environment lookups, path strings and
//! macros. Parsing is done by a packrat PEG runtime with memoization, left
//! recursion, cut, and a diagnostic second pass for error messages.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Tokenizer → Parser → AST
//!                                  ↘ Trace → TUI
//! ```
//!
//! 1. [`tokenizer`]: a line-driven lexer state machine plus the caching
//!    [`tokenizer::Tokenizer`] buffer the parser backtracks over.
//! 2. [`parser`]: the packrat runtime ([`parser::runtime`]) and the
//!    grammar rules that build [`parser::ast`] nodes.
//! 3. [`trace`]: bounded log of rule entries, exits, memo hits and
//!    left-recursion growth recorded when a parser runs verbose.
//! 4. [`ui`]: ratatui-based trace viewer; not part of the stable library
//!    API.
//!
//! ## Quick start
//!
//! ```no_run
//! use xonsh_parser::parser::{parse_string, runtime::ParserOptions};
//!
//! let ast = parse_string("x = $(ls | grep wakka)\n", ParserOptions::default());
//! assert!(ast.is_ok());
//! ```

pub mod parser;
pub mod tokenizer;
pub mod trace;
pub mod ui;
