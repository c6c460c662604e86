//! Tokenizer for the shell language.
//!
//! [`lexer::Lexer`] turns lines into raw tokens; [`stream::Tokenizer`]
//! buffers the significant ones for the parser.

pub mod brackets;
pub mod error;
pub mod lexer;
pub mod source;
pub mod stream;
pub mod token;

pub use error::TokenizeError;
pub use lexer::Lexer;
pub use stream::{tokenize_all, Diagnosis, Mark, Tokenizer};
pub use token::{Position, TokenInfo, TokenKind};
