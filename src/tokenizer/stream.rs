//! The buffered token stream the parser backtracks over.
//!
//! [`Tokenizer`] pulls raw tokens from the [`Lexer`] on demand, drops the
//! ones the grammar never sees (whitespace, comments, non-logical
//! newlines) and keeps every significant token it has handed out, so a
//! [`Mark`] is just an index into that buffer.

use super::error::TokenizeError;
use super::lexer::Lexer;
use super::source::ReaderLines;
use super::token::{TokenInfo, TokenKind};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// A position in the token stream.
pub type Mark = usize;

/// Where the tokenizer stopped, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub line: usize,
    pub column: usize,
    pub line_text: String,
    pub token: Option<TokenInfo>,
}

pub struct Tokenizer {
    lexer: Lexer,
    tokens: Vec<TokenInfo>,
    /// `last_real[i]` is the index of the last non-layout token in
    /// `tokens[..=i]`, filled in as tokens are buffered.
    last_real: Vec<Option<usize>>,
    index: Mark,
    line_cache: FxHashMap<usize, Arc<str>>,
    path: Option<PathBuf>,
    reads: usize,
}

impl Tokenizer {
    pub fn new(lexer: Lexer) -> Self {
        Tokenizer {
            lexer,
            tokens: Vec::new(),
            last_real: Vec::new(),
            index: 0,
            line_cache: FxHashMap::default(),
            path: None,
            reads: 0,
        }
    }

    pub fn from_str(source: &str) -> Self {
        Self::new(Lexer::new(source))
    }

    /// Stream a file line by line. The path is kept so error reports can
    /// re-read lines that were never cached.
    pub fn from_path(path: &Path, tabsize: usize) -> Result<Self, TokenizeError> {
        let file = File::open(path)?;
        let lexer = Lexer::from_source(Box::new(ReaderLines::new(BufReader::new(file))))
            .with_tabsize(tabsize);
        let mut tokenizer = Self::new(lexer);
        tokenizer.path = Some(path.to_path_buf());
        Ok(tokenizer)
    }

    /// The next significant token, without advancing.
    pub fn peek(&mut self) -> Result<&TokenInfo, TokenizeError> {
        if self.index == self.tokens.len() {
            self.fetch()?;
        }
        Ok(&self.tokens[self.index])
    }

    /// The next significant token; advances past it.
    pub fn getnext(&mut self) -> Result<TokenInfo, TokenizeError> {
        let tok = self.peek()?.clone();
        self.index += 1;
        self.reads += 1;
        Ok(tok)
    }

    pub fn mark(&self) -> Mark {
        self.index
    }

    pub fn reset(&mut self, mark: Mark) {
        debug_assert!(mark <= self.tokens.len(), "reset past the buffered tokens");
        if mark != self.index {
            trace!(from = self.index, to = mark, "reset");
        }
        self.index = mark;
    }

    fn fetch(&mut self) -> Result<(), TokenizeError> {
        loop {
            let tok = self.lexer.next_token()?;
            self.line_cache
                .entry(tok.start.line)
                .or_insert_with(|| tok.line.clone());
            if self.is_blank(&tok) {
                continue;
            }
            trace!(index = self.tokens.len(), token = %tok, "fetched");
            let prev = self.last_real.last().copied().flatten();
            let real = if tok.kind.is_layout() {
                prev
            } else {
                Some(self.tokens.len())
            };
            self.last_real.push(real);
            self.tokens.push(tok);
            return Ok(());
        }
    }

    fn is_blank(&self, tok: &TokenInfo) -> bool {
        match tok.kind {
            TokenKind::Ws | TokenKind::Nl | TokenKind::Comment => true,
            TokenKind::ErrorToken => tok.text.trim().is_empty(),
            TokenKind::Newline => {
                matches!(self.tokens.last(), Some(prev) if prev.kind == TokenKind::Newline)
            }
            _ => false,
        }
    }

    /// The last token before the current position that is not a layout
    /// token (NEWLINE, INDENT, DEDENT, ENDMARKER).
    ///
    /// Constant time: the answer for every buffered position is recorded
    /// once when the token is fetched.
    pub fn get_last_non_whitespace_token(&self) -> Option<&TokenInfo> {
        let last = self.index.checked_sub(1)?;
        self.last_real
            .get(last)
            .copied()
            .flatten()
            .map(|i| &self.tokens[i])
    }

    /// The furthest point the parser looked at. Does not change any state.
    pub fn diagnose(&self) -> Diagnosis {
        match self.tokens.last() {
            Some(tok) => Diagnosis {
                line: tok.start.line,
                column: tok.start.column,
                line_text: tok.line.to_string(),
                token: Some(tok.clone()),
            },
            None => Diagnosis {
                line: 1,
                column: 0,
                line_text: String::new(),
                token: None,
            },
        }
    }

    /// Source text of the requested lines, from the cache or, failing that,
    /// by re-reading the file. Unknown lines are skipped.
    pub fn get_lines(&mut self, line_numbers: &[usize]) -> Vec<String> {
        let missing = line_numbers
            .iter()
            .any(|n| !self.line_cache.contains_key(n));
        if missing {
            if let Some(path) = &self.path {
                if let Ok(text) = std::fs::read_to_string(path) {
                    for (i, line) in text.split_inclusive('\n').enumerate() {
                        self.line_cache
                            .entry(i + 1)
                            .or_insert_with(|| Arc::from(line));
                    }
                }
            }
        }
        line_numbers
            .iter()
            .filter_map(|n| self.line_cache.get(n).map(|line| line.to_string()))
            .collect()
    }

    /// Every significant token buffered so far.
    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    /// Number of tokens consumed with [`Tokenizer::getnext`].
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn filename(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Tokenize `source` completely, as the parser would see it.
pub fn tokenize_all(source: &str) -> Result<Vec<TokenInfo>, TokenizeError> {
    let mut tokenizer = Tokenizer::from_str(source);
    loop {
        if tokenizer.getnext()?.kind == TokenKind::EndMarker {
            break;
        }
    }
    Ok(tokenizer.tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tokens_are_dropped() {
        let tokens = tokenize_all("x = 1  # one\n\n\ny\n").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Name,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Name,
                TokenKind::Newline,
                TokenKind::EndMarker,
            ]
        );
    }

    #[test]
    fn test_mark_and_reset() {
        let mut tokenizer = Tokenizer::from_str("a b c");
        let start = tokenizer.mark();
        assert_eq!(tokenizer.getnext().unwrap().text, "a");
        assert_eq!(tokenizer.getnext().unwrap().text, "b");
        tokenizer.reset(start);
        assert_eq!(tokenizer.peek().unwrap().text, "a");
        assert_eq!(tokenizer.mark(), start);
    }

    #[test]
    fn test_endmarker_repeats() {
        let mut tokenizer = Tokenizer::from_str("");
        assert_eq!(tokenizer.getnext().unwrap().kind, TokenKind::EndMarker);
        assert_eq!(tokenizer.getnext().unwrap().kind, TokenKind::EndMarker);
    }

    #[test]
    fn test_last_non_whitespace_token_skips_layout() {
        let mut tokenizer = Tokenizer::from_str("if x:\n    y\n");
        assert!(tokenizer.get_last_non_whitespace_token().is_none());
        for _ in 0..5 {
            tokenizer.getnext().unwrap();
        }
        // consumed: if x : NEWLINE INDENT
        assert_eq!(tokenizer.get_last_non_whitespace_token().unwrap().text, ":");
        tokenizer.reset(1);
        assert_eq!(tokenizer.get_last_non_whitespace_token().unwrap().text, "if");
    }

    #[test]
    fn test_diagnose_reports_furthest_token() {
        let mut tokenizer = Tokenizer::from_str("a = (\n  1 +\n  2)\n");
        for _ in 0..6 {
            tokenizer.getnext().unwrap();
        }
        tokenizer.reset(0);
        let diagnosis = tokenizer.diagnose();
        assert_eq!(diagnosis.line, 3);
        assert_eq!(diagnosis.column, 2);
        assert_eq!(diagnosis.line_text, "  2)\n");
        assert_eq!(tokenizer.mark(), 0);
    }

    #[test]
    fn test_get_lines_from_cache() {
        let mut tokenizer = Tokenizer::from_str("a\nb\nc\n");
        while tokenizer.getnext().unwrap().kind != TokenKind::EndMarker {}
        assert_eq!(tokenizer.get_lines(&[1, 3]), vec!["a\n", "c\n"]);
        assert!(tokenizer.get_lines(&[9]).is_empty());
    }
}
