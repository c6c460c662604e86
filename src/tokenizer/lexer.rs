//! Line-driven lexer for the shell language.
//!
//! The lexer pulls physical lines from a [`LineSource`] and hands out one raw
//! token at a time, including whitespace, comments and non-logical newlines.
//! It is lazy: nothing past the last returned token has been scanned.
//!
//! # Modes
//!
//! Ordinary lexing depends on the innermost open bracket (see
//! [`Universe`]): expression tokens in host brackets, argument words inside
//! subprocess literals. On top of that a mode stack tracks multi-line
//! strings and the nested parts of f-strings (literal text, `{...}`
//! replacement fields, format specs).
//!
//! # Macros
//!
//! Macro arguments are never tokenized. The lexer switches to raw capture
//! as soon as it recognizes an opener and queues the captured text as
//! MACRO_PARAM tokens:
//!
//! - `name!(` with the name glued to `!(`: one token per top-level comma
//!   separated argument.
//! - `!` between subprocess words: the rest of the literal, as one token.
//! - `with! ...:` at the start of a logical line: the rest of the line, or
//!   the indented block below it.

use super::brackets::{Bracket, BracketStack, Universe};
use super::error::TokenizeError;
use super::source::{LineSource, StrLines};
use super::token::{
    is_keyword, longest_match, Position, TokenInfo, TokenKind, ARGV_OPERATORS, OPERATORS,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TABSIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Quote {
    ch: char,
    triple: bool,
}

impl Quote {
    fn len(self) -> usize {
        if self.triple {
            3
        } else {
            1
        }
    }
}

#[derive(Debug)]
enum Mode {
    /// A plain string continued onto following lines.
    String {
        quote: Quote,
        text: String,
        start: Position,
        line: Arc<str>,
    },
    /// Literal text of an f-string.
    FStringMiddle {
        quote: Quote,
        text: String,
        start: Position,
    },
    /// Inside `{...}` of an f-string; `depth` is the bracket depth of the `{`.
    FStringBraces { depth: usize },
    /// Format spec after the `:` of a replacement field.
    FStringSpec {
        text: String,
        start: Position,
    },
}

/// Accumulates captured macro text with surrounding whitespace stripped.
struct ParamBuf {
    text: String,
    pending_ws: String,
    start: Option<Position>,
    end: Position,
    line: Option<Arc<str>>,
}

impl ParamBuf {
    fn new(at: Position) -> Self {
        ParamBuf {
            text: String::new(),
            pending_ws: String::new(),
            start: None,
            end: at,
            line: None,
        }
    }

    fn push(&mut self, c: char, at: Position, line: &Arc<str>) {
        if c.is_whitespace() {
            if self.start.is_some() {
                self.pending_ws.push(c);
            }
            return;
        }
        if self.start.is_none() {
            self.start = Some(at);
            self.line = Some(line.clone());
        }
        self.text.push_str(&self.pending_ws);
        self.pending_ws.clear();
        self.text.push(c);
        self.end = Position::new(at.line, at.column + 1);
    }

    fn is_blank(&self) -> bool {
        self.start.is_none()
    }

    fn into_token(self, fallback_line: &Arc<str>) -> TokenInfo {
        let start = self.start.unwrap_or(self.end);
        let line = self.line.unwrap_or_else(|| fallback_line.clone());
        TokenInfo::new(TokenKind::MacroParam, self.text, start, self.end, line)
    }
}

/// Pull-based lexer.
pub struct Lexer {
    source: Box<dyn LineSource>,
    pushback: Option<String>,
    line: Vec<char>,
    line_text: Arc<str>,
    lnum: usize,
    pos: usize,
    indents: Vec<usize>,
    brackets: BracketStack,
    modes: Vec<Mode>,
    continued: bool,
    pending: VecDeque<TokenInfo>,
    last_significant: Option<TokenKind>,
    tabsize: usize,
    finished: bool,
    recent: Option<Recent>,
    /// Significant tokens emitted on the current logical line.
    line_tokens: usize,
    /// Inside the header of `with! ...:`; the body is captured at the colon.
    with_header: bool,
}

/// What the lexer remembers about the previous significant token to spot
/// macro openers.
#[derive(Debug, Clone, Copy)]
struct Recent {
    end: Position,
    macro_name: bool,
    with_at_start: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self::from_source(Box::new(StrLines::new(input)))
    }

    pub fn from_source(source: Box<dyn LineSource>) -> Self {
        Lexer {
            source,
            pushback: None,
            line: Vec::new(),
            line_text: Arc::from(""),
            lnum: 0,
            pos: 0,
            indents: vec![0],
            brackets: BracketStack::new(),
            modes: Vec::new(),
            continued: false,
            pending: VecDeque::new(),
            last_significant: None,
            tabsize: DEFAULT_TABSIZE,
            finished: false,
            recent: None,
            line_tokens: 0,
            with_header: false,
        }
    }

    pub fn with_tabsize(mut self, tabsize: usize) -> Self {
        self.tabsize = tabsize.max(1);
        self
    }

    /// Every raw token up to and including ENDMARKER.
    pub fn tokenize(&mut self) -> Result<Vec<TokenInfo>, TokenizeError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::EndMarker;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    /// Next raw token. Once the input is exhausted this keeps returning
    /// ENDMARKER.
    pub fn next_token(&mut self) -> Result<TokenInfo, TokenizeError> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Ok(tok);
            }
            if self.finished {
                let eof = Position::new(self.lnum + 1, 0);
                return Ok(TokenInfo::new(TokenKind::EndMarker, "", eof, eof, Arc::from("")));
            }
            self.step()?;
        }
    }

    fn step(&mut self) -> Result<(), TokenizeError> {
        if self.pos >= self.line.len() {
            return self.advance_line();
        }
        match self.modes.last() {
            Some(Mode::String { .. }) => self.continue_string(),
            Some(Mode::FStringMiddle { .. }) => self.fstring_middle(),
            Some(Mode::FStringSpec { .. }) => self.fstring_spec(),
            Some(Mode::FStringBraces { .. }) | None => self.lex_token(),
        }
    }

    // ----- lines -------------------------------------------------------

    fn read_line(&mut self) -> Result<Option<String>, TokenizeError> {
        if let Some(line) = self.pushback.take() {
            return Ok(Some(line));
        }
        self.source.next_line()
    }

    fn load_line(&mut self, text: String) {
        self.lnum += 1;
        self.line = text.chars().collect();
        self.line_text = Arc::from(text);
        self.pos = 0;
    }

    /// Load the next physical line without any indentation processing.
    fn raw_next_line(&mut self) -> Result<bool, TokenizeError> {
        match self.read_line()? {
            Some(text) => {
                self.load_line(text);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn advance_line(&mut self) -> Result<(), TokenizeError> {
        let Some(text) = self.read_line()? else {
            return self.finish();
        };
        self.load_line(text);
        if !self.modes.is_empty() {
            self.continued = false;
            return Ok(());
        }
        if self.brackets.is_empty() && !self.continued {
            self.line_start()
        } else {
            self.continued = false;
            Ok(())
        }
    }

    /// Measure indentation of a new logical line and emit INDENT/DEDENT.
    fn line_start(&mut self) -> Result<(), TokenizeError> {
        let mut column = 0;
        while self.pos < self.line.len() {
            match self.line[self.pos] {
                ' ' => column += 1,
                '\t' => column = (column / self.tabsize + 1) * self.tabsize,
                '\x0c' => column = 0,
                _ => break,
            }
            self.pos += 1;
        }
        if self.pos == self.line.len() {
            return Ok(());
        }

        let c = self.line[self.pos];
        if matches!(c, '#' | '\r' | '\n') {
            if c == '#' {
                let end = self.content_end();
                self.emit_span(TokenKind::Comment, self.pos, end);
                self.pos = end;
            }
            let len = self.line.len();
            self.emit_span(TokenKind::Nl, self.pos, len);
            self.pos = len;
            return Ok(());
        }

        let here = self.here();
        if column > self.current_indent() {
            self.indents.push(column);
            self.emit(TokenKind::Indent, String::new(), here, here);
        }
        while column < self.current_indent() {
            if !self.indents.contains(&column) {
                return Err(TokenizeError::Dedent { position: here });
            }
            self.indents.pop();
            self.emit(TokenKind::Dedent, String::new(), here, here);
        }
        Ok(())
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn finish(&mut self) -> Result<(), TokenizeError> {
        let eof = Position::new(self.lnum + 1, 0);
        match self.modes.last() {
            Some(Mode::String { start, .. }) => {
                return Err(TokenizeError::UnterminatedString { position: *start })
            }
            Some(Mode::FStringMiddle { start, .. }) | Some(Mode::FStringSpec { start, .. }) => {
                return Err(TokenizeError::UnterminatedFString { position: *start })
            }
            Some(Mode::FStringBraces { .. }) => {
                return Err(TokenizeError::UnterminatedFString { position: eof })
            }
            None => {}
        }
        if let Some(open) = self.brackets.top() {
            return Err(TokenizeError::UnclosedBracket {
                opener: open.opener,
                position: open.position,
            });
        }
        if self.continued {
            return Err(TokenizeError::EofInMultiLineStatement { position: eof });
        }

        let needs_newline = matches!(
            self.last_significant,
            Some(kind) if !matches!(kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
        );
        if needs_newline {
            let start = Position::new(self.lnum, self.line.len());
            let end = Position::new(self.lnum, self.line.len() + 1);
            self.emit(TokenKind::Newline, String::new(), start, end);
        }
        for _ in 1..self.indents.len() {
            self.emit(TokenKind::Dedent, String::new(), eof, eof);
        }
        self.indents.truncate(1);
        self.line_text = Arc::from("");
        self.emit(TokenKind::EndMarker, String::new(), eof, eof);
        self.finished = true;
        Ok(())
    }

    // ----- helpers -----------------------------------------------------

    fn here(&self) -> Position {
        Position::new(self.lnum, self.pos)
    }

    fn at(&self, column: usize) -> Position {
        Position::new(self.lnum, column)
    }

    fn slice(&self, from: usize, to: usize) -> String {
        self.line[from..to.min(self.line.len())].iter().collect()
    }

    fn scan_while(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        let mut i = from;
        while i < self.line.len() && pred(self.line[i]) {
            i += 1;
        }
        i
    }

    /// Column where the line terminator starts.
    fn content_end(&self) -> usize {
        let mut end = self.line.len();
        while end > self.pos && matches!(self.line[end - 1], '\n' | '\r') {
            end -= 1;
        }
        end
    }

    fn is_line_end(&self, i: usize) -> bool {
        match self.line.get(i) {
            None | Some('\n') => true,
            Some('\r') => matches!(self.line.get(i + 1), None | Some('\n')),
            _ => false,
        }
    }

    fn ends_with_continuation(&self) -> bool {
        let end = self.content_end();
        end > 0 && end < self.line.len() && self.line[end - 1] == '\\'
    }

    fn emit(&mut self, kind: TokenKind, text: String, start: Position, end: Position) {
        if !matches!(kind, TokenKind::Ws | TokenKind::Nl | TokenKind::Comment) {
            self.last_significant = Some(kind);
            let is_name = kind == TokenKind::Name;
            self.recent = Some(Recent {
                end,
                macro_name: is_name && !is_keyword(&text),
                with_at_start: is_name && text == "with" && self.line_tokens == 0,
            });
            match kind {
                TokenKind::Newline => {
                    self.line_tokens = 0;
                    self.with_header = false;
                }
                TokenKind::Indent | TokenKind::Dedent => {}
                _ => self.line_tokens += 1,
            }
        }
        self.pending
            .push_back(TokenInfo::new(kind, text, start, end, self.line_text.clone()));
    }

    fn emit_span(&mut self, kind: TokenKind, from: usize, to: usize) {
        let text = self.slice(from, to);
        self.emit(kind, text, self.at(from), self.at(to));
    }

    // ----- ordinary tokens ---------------------------------------------

    fn lex_token(&mut self) -> Result<(), TokenizeError> {
        let start = self.pos;
        let c = self.line[start];

        if is_space(c) {
            let end = self.scan_while(start, is_space);
            self.emit_span(TokenKind::Ws, start, end);
            self.pos = end;
            return Ok(());
        }
        if c == '\n' || c == '\r' {
            let len = self.line.len();
            let kind = if self.brackets.is_empty() {
                TokenKind::Newline
            } else {
                TokenKind::Nl
            };
            self.emit_span(kind, start, len);
            self.pos = len;
            return Ok(());
        }
        if c == '\\' && self.is_line_end(start + 1) {
            self.continued = true;
            self.pos = self.line.len();
            return Ok(());
        }
        let in_argv = self.brackets.in_argv();
        if c == '#' && !in_argv {
            let end = self.content_end();
            self.emit_span(TokenKind::Comment, start, end);
            self.pos = end;
            return Ok(());
        }
        if self.string_start()? || self.search_path()? {
            return Ok(());
        }
        if in_argv {
            return self.lex_argv();
        }

        let next_is_digit = self.line.get(start + 1).is_some_and(|n| n.is_ascii_digit());
        if c.is_ascii_digit() || (c == '.' && next_is_digit) {
            let end = self.number_end(start);
            self.emit_span(TokenKind::Number, start, end);
            self.pos = end;
            return Ok(());
        }
        if is_ident_start(c) {
            let end = self.scan_while(start, is_ident_continue);
            self.emit_span(TokenKind::Name, start, end);
            self.pos = end;
            return Ok(());
        }
        if let Some(op) = longest_match(OPERATORS, &self.line, start) {
            return self.operator(op);
        }

        self.emit_span(TokenKind::ErrorToken, start, start + 1);
        self.pos = start + 1;
        Ok(())
    }

    fn number_end(&self, start: usize) -> usize {
        let digits = |i: usize| self.scan_while(i, |c| c.is_ascii_digit() || c == '_');
        if self.line[start] == '0'
            && matches!(
                self.line.get(start + 1),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            )
        {
            return self.scan_while(start + 2, |c| c.is_ascii_hexdigit() || c == '_');
        }
        let mut i = digits(start);
        if self.line.get(i) == Some(&'.') {
            i = digits(i + 1);
        }
        if matches!(self.line.get(i), Some('e' | 'E')) {
            let mut j = i + 1;
            if matches!(self.line.get(j), Some('+' | '-')) {
                j += 1;
            }
            if self.line.get(j).is_some_and(|c| c.is_ascii_digit()) {
                i = digits(j);
            }
        }
        if matches!(self.line.get(i), Some('j' | 'J')) {
            i += 1;
        }
        i
    }

    fn operator(&mut self, op: &'static str) -> Result<(), TokenizeError> {
        let start = self.pos;
        let end = start + op.chars().count();
        let position = self.here();

        match op {
            ")" | "]" | "}" => {
                let closer = if op == ")" {
                    ')'
                } else if op == "]" {
                    ']'
                } else {
                    '}'
                };
                let depth = self.brackets.depth();
                self.brackets.pop_matching(closer, position)?;
                if matches!(self.modes.last(), Some(Mode::FStringBraces { depth: d }) if *d == depth)
                {
                    self.modes.pop();
                }
            }
            ":" => {
                let depth = self.brackets.depth();
                if matches!(self.modes.last(), Some(Mode::FStringBraces { depth: d }) if *d == depth)
                {
                    self.emit_span(TokenKind::Op, start, end);
                    self.pos = end;
                    self.modes.push(Mode::FStringSpec {
                        text: String::new(),
                        start: self.here(),
                    });
                    return Ok(());
                }
                if self.with_header && depth == 0 {
                    self.with_header = false;
                    self.emit_span(TokenKind::Op, start, end);
                    self.pos = end;
                    return self.capture_with_block();
                }
            }
            "!" if self.brackets.in_argv() => {
                self.emit_span(TokenKind::Op, start, end);
                self.pos = end;
                return self.capture_proc_macro();
            }
            "!" => {
                if matches!(self.recent, Some(r) if r.with_at_start && r.end == position) {
                    self.with_header = true;
                }
            }
            "!(" if matches!(self.recent, Some(r) if r.macro_name && r.end == position) => {
                if let Some(bracket) = BracketStack::classify(op, Universe::Macro, position) {
                    self.brackets.push(Bracket {
                        universe: Universe::Macro,
                        ..bracket
                    });
                }
                self.emit_span(TokenKind::Op, start, end);
                self.pos = end;
                return self.capture_call_macro();
            }
            _ => {
                let universe = self.brackets.universe();
                if let Some(bracket) = BracketStack::classify(op, universe, position) {
                    if bracket.universe != universe {
                        debug!(opener = op, line = self.lnum, "entering {:?} brackets", bracket.universe);
                    }
                    self.brackets.push(bracket);
                }
            }
        }

        self.emit_span(TokenKind::Op, start, end);
        self.pos = end;
        Ok(())
    }

    /// Argument words inside a subprocess literal.
    fn lex_argv(&mut self) -> Result<(), TokenizeError> {
        let start = self.pos;
        let c = self.line[start];

        if c == '$' && self.line.get(start + 1).is_some_and(|&n| is_ident_start(n)) {
            self.emit_span(TokenKind::Op, start, start + 1);
            let end = self.scan_while(start + 1, is_ident_continue);
            self.emit_span(TokenKind::Name, start + 1, end);
            self.pos = end;
            return Ok(());
        }
        if let Some(op) = longest_match(ARGV_OPERATORS, &self.line, start) {
            return self.operator(op);
        }

        let end = self.word_end(start);
        if end == start {
            self.emit_span(TokenKind::ErrorToken, start, start + 1);
            self.pos = start + 1;
            return Ok(());
        }
        self.emit_span(TokenKind::Word, start, end);
        self.pos = end;
        Ok(())
    }

    fn word_end(&self, start: usize) -> usize {
        let mut i = start;
        while i < self.line.len() {
            let c = self.line[i];
            let next = self.line.get(i + 1).copied();
            let stop = match c {
                '\n' | '\r' | '\'' | '"' | '`' => true,
                '(' | ')' | '[' | ']' | '{' | '}' | '|' | '&' | '<' | '>' | '!' => true,
                '$' => next.is_some_and(|n| is_ident_start(n) || matches!(n, '(' | '[' | '{')),
                '@' => next == Some('(') || (next == Some('$') && self.line.get(i + 2) == Some(&'(')),
                _ => is_space(c),
            };
            if stop {
                break;
            }
            i += 1;
        }
        i
    }

    fn search_path(&mut self) -> Result<bool, TokenizeError> {
        let start = self.pos;
        let tick = if self.line[start] == '@' {
            self.scan_while(start + 1, is_ident_continue)
        } else {
            self.scan_while(start, |c| matches!(c, 'r' | 'g' | 'p' | 'f'))
        };
        if self.line.get(tick) != Some(&'`') {
            return Ok(false);
        }

        let mut i = tick + 1;
        while i < self.line.len() {
            match self.line[i] {
                '\\' => i += 2,
                '`' => {
                    self.emit_span(TokenKind::SearchPath, start, i + 1);
                    self.pos = i + 1;
                    return Ok(true);
                }
                '\n' | '\r' => break,
                _ => i += 1,
            }
        }
        Err(TokenizeError::UnterminatedSearchPath {
            position: self.at(start),
        })
    }

    // ----- strings -----------------------------------------------------

    fn string_start(&mut self) -> Result<bool, TokenizeError> {
        let start = self.pos;
        let prefix_end = self.scan_while(start, is_ident_continue);
        let Some(&q) = self.line.get(prefix_end) else {
            return Ok(false);
        };
        if q != '\'' && q != '"' {
            return Ok(false);
        }
        let prefix = self.slice(start, prefix_end);
        if !is_string_prefix(&prefix) {
            return Ok(false);
        }

        let triple = self.line.get(prefix_end + 1) == Some(&q) && self.line.get(prefix_end + 2) == Some(&q);
        let quote = Quote { ch: q, triple };
        let body = prefix_end + quote.len();

        if prefix.to_ascii_lowercase().contains('f') {
            self.emit_span(TokenKind::FStringStart, start, body);
            self.pos = body;
            let here = self.here();
            self.modes.push(Mode::FStringMiddle {
                quote,
                text: String::new(),
                start: here,
            });
            return Ok(true);
        }

        match self.find_closing_quote(body, quote) {
            Some(end) => {
                self.emit_span(TokenKind::String, start, end);
                self.pos = end;
            }
            None if quote.triple || self.ends_with_continuation() => {
                let text = self.slice(start, self.line.len());
                self.modes.push(Mode::String {
                    quote,
                    text,
                    start: self.at(start),
                    line: self.line_text.clone(),
                });
                self.pos = self.line.len();
            }
            None => {
                return Err(TokenizeError::UnterminatedString {
                    position: self.at(start),
                })
            }
        }
        Ok(true)
    }

    /// Index just past the closing quote, if it is on this line.
    fn find_closing_quote(&self, from: usize, quote: Quote) -> Option<usize> {
        let mut i = from;
        while i < self.line.len() {
            let c = self.line[i];
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == quote.ch && self.closes(i, quote) {
                return Some(i + quote.len());
            }
            if !quote.triple && matches!(c, '\n' | '\r') {
                return None;
            }
            i += 1;
        }
        None
    }

    fn closes(&self, i: usize, quote: Quote) -> bool {
        !quote.triple
            || (self.line.get(i + 1) == Some(&quote.ch) && self.line.get(i + 2) == Some(&quote.ch))
    }

    fn continue_string(&mut self) -> Result<(), TokenizeError> {
        let Some(Mode::String { quote, start, .. }) = self.modes.last() else {
            return Ok(());
        };
        let (quote, start) = (*quote, *start);

        match self.find_closing_quote(0, quote) {
            Some(end) => {
                let chunk = self.slice(0, end);
                if let Some(Mode::String { text, line, .. }) = self.modes.pop() {
                    self.last_significant = Some(TokenKind::String);
                    self.pending.push_back(TokenInfo::new(
                        TokenKind::String,
                        text + &chunk,
                        start,
                        self.at(end),
                        line,
                    ));
                }
                self.pos = end;
                Ok(())
            }
            None if quote.triple || self.ends_with_continuation() => {
                let chunk = self.slice(0, self.line.len());
                if let Some(Mode::String { text, .. }) = self.modes.last_mut() {
                    text.push_str(&chunk);
                }
                self.pos = self.line.len();
                Ok(())
            }
            None => Err(TokenizeError::UnterminatedString { position: start }),
        }
    }

    // ----- f-strings ---------------------------------------------------

    /// Emit the literal text collected so far (plus the current line up to
    /// `end`) as one FSTRING_MIDDLE.
    fn flush_fstring_text(&mut self, end: usize) {
        let chunk = self.slice(self.pos, end);
        let taken = match self.modes.last_mut() {
            Some(Mode::FStringMiddle { text, start, .. }) | Some(Mode::FStringSpec { text, start, .. }) => {
                text.push_str(&chunk);
                Some((std::mem::take(text), *start))
            }
            _ => None,
        };
        if let Some((text, start)) = taken {
            if !text.is_empty() {
                self.emit(TokenKind::FStringMiddle, text, start, self.at(end));
            }
        }
        self.pos = end;
    }

    fn append_fstring_line(&mut self) {
        let chunk = self.slice(self.pos, self.line.len());
        if let Some(Mode::FStringMiddle { text, .. }) = self.modes.last_mut() {
            text.push_str(&chunk);
        }
        self.pos = self.line.len();
    }

    fn open_replacement_field(&mut self, at: usize) {
        self.flush_fstring_text(at);
        self.emit_span(TokenKind::Op, at, at + 1);
        let position = self.at(at);
        self.brackets.push(Bracket {
            universe: Universe::Host,
            opener: "{",
            closer: '}',
            position,
        });
        self.modes.push(Mode::FStringBraces {
            depth: self.brackets.depth(),
        });
        self.pos = at + 1;
    }

    fn fstring_middle(&mut self) -> Result<(), TokenizeError> {
        let here = self.here();
        let quote = match self.modes.last_mut() {
            Some(Mode::FStringMiddle { quote, text, start }) => {
                if text.is_empty() {
                    *start = here;
                }
                *quote
            }
            _ => return Ok(()),
        };

        let mut i = self.pos;
        while i < self.line.len() {
            let c = self.line[i];
            let next = self.line.get(i + 1).copied();
            match c {
                '\\' if self.is_line_end(i + 1) => {
                    self.append_fstring_line();
                    return Ok(());
                }
                '\\' => i += 2,
                _ if c == quote.ch && self.closes(i, quote) => {
                    let end = i + quote.len();
                    self.flush_fstring_text(i);
                    self.emit_span(TokenKind::FStringEnd, i, end);
                    self.modes.pop();
                    self.pos = end;
                    return Ok(());
                }
                '{' if next == Some('{') => i += 2,
                '{' => {
                    self.open_replacement_field(i);
                    return Ok(());
                }
                '}' if next == Some('}') => i += 2,
                '\n' | '\r' if !quote.triple => {
                    return Err(TokenizeError::UnterminatedFString {
                        position: self.at(i),
                    })
                }
                _ => i += 1,
            }
        }
        self.append_fstring_line();
        Ok(())
    }

    fn fstring_spec(&mut self) -> Result<(), TokenizeError> {
        let here = self.here();
        if let Some(Mode::FStringSpec { text, start, .. }) = self.modes.last_mut() {
            if text.is_empty() {
                *start = here;
            }
        }

        let mut i = self.pos;
        while i < self.line.len() {
            match self.line[i] {
                '{' => {
                    self.open_replacement_field(i);
                    return Ok(());
                }
                '}' => {
                    self.flush_fstring_text(i);
                    let position = self.at(i);
                    self.brackets.pop_matching('}', position)?;
                    self.emit_span(TokenKind::Op, i, i + 1);
                    // the spec, then the replacement field it belongs to
                    self.modes.pop();
                    self.modes.pop();
                    self.pos = i + 1;
                    return Ok(());
                }
                '\\' => i += 2,
                '\n' | '\r' => break,
                _ => i += 1,
            }
        }
        Err(TokenizeError::UnterminatedFString {
            position: self.at(i.min(self.line.len())),
        })
    }

    // ----- raw captures ------------------------------------------------

    fn unclosed(&self) -> TokenizeError {
        match self.brackets.top() {
            Some(open) => TokenizeError::UnclosedBracket {
                opener: open.opener,
                position: open.position,
            },
            None => TokenizeError::EofInMultiLineStatement {
                position: self.here(),
            },
        }
    }

    /// Copy a quoted string verbatim into `buf`, crossing lines for triple
    /// quotes.
    fn raw_string(&mut self, buf: &mut ParamBuf) -> Result<(), TokenizeError> {
        let q = self.line[self.pos];
        let start = self.here();
        let quote = Quote {
            ch: q,
            triple: self.line.get(self.pos + 1) == Some(&q) && self.line.get(self.pos + 2) == Some(&q),
        };
        for _ in 0..quote.len() {
            buf.push(q, self.here(), &self.line_text);
            self.pos += 1;
        }
        loop {
            if self.pos >= self.line.len() {
                if !quote.triple || !self.raw_next_line()? {
                    return Err(TokenizeError::UnterminatedString { position: start });
                }
                continue;
            }
            let c = self.line[self.pos];
            if c == '\\' {
                buf.push(c, self.here(), &self.line_text);
                self.pos += 1;
                if self.pos < self.line.len() {
                    buf.push(self.line[self.pos], self.here(), &self.line_text);
                    self.pos += 1;
                }
                continue;
            }
            if c == q && self.closes(self.pos, quote) {
                for _ in 0..quote.len() {
                    buf.push(q, self.here(), &self.line_text);
                    self.pos += 1;
                }
                return Ok(());
            }
            if !quote.triple && matches!(c, '\n' | '\r') {
                return Err(TokenizeError::UnterminatedString { position: start });
            }
            buf.push(c, self.here(), &self.line_text);
            self.pos += 1;
        }
    }

    /// Track a bracket inside raw text. Returns the error for a closer that
    /// does not match.
    fn raw_bracket(&mut self, c: char) -> Result<(), TokenizeError> {
        let position = self.here();
        let (opener, closer) = match c {
            '(' => ("(", ')'),
            '[' => ("[", ']'),
            '{' => ("{", '}'),
            _ => {
                self.brackets.pop_matching(c, position)?;
                return Ok(());
            }
        };
        self.brackets.push(Bracket {
            universe: Universe::Macro,
            opener,
            closer,
            position,
        });
        Ok(())
    }

    /// Capture the arguments of `name!(...)`, right after the `!(`.
    ///
    /// Queues one MACRO_PARAM per top-level comma separated argument and
    /// leaves the closing `)` to be lexed normally.
    fn capture_call_macro(&mut self) -> Result<(), TokenizeError> {
        let base = self.brackets.depth();
        let mut param = ParamBuf::new(self.here());
        let mut count = 0;

        loop {
            if self.pos >= self.line.len() {
                if !self.raw_next_line()? {
                    return Err(self.unclosed());
                }
                continue;
            }
            let c = self.line[self.pos];
            if self.brackets.depth() == base && (c == ',' || c == ')') {
                let done = std::mem::replace(&mut param, ParamBuf::new(self.here()));
                if !done.is_blank() {
                    self.pending.push_back(done.into_token(&self.line_text));
                    count += 1;
                }
                if c == ')' {
                    debug!(line = self.lnum, count, "captured call macro arguments");
                    self.last_significant = Some(TokenKind::MacroParam);
                    return Ok(());
                }
                self.pos += 1;
                continue;
            }
            match c {
                '\'' | '"' => {
                    self.raw_string(&mut param)?;
                    continue;
                }
                '(' | '[' | '{' | ')' | ']' | '}' => self.raw_bracket(c)?,
                _ => {}
            }
            param.push(c, self.here(), &self.line_text);
            self.pos += 1;
        }
    }

    /// Capture the rest of a subprocess literal after `cmd !` as a single
    /// stripped MACRO_PARAM, possibly empty. The literal's closer is left
    /// to be lexed normally.
    fn capture_proc_macro(&mut self) -> Result<(), TokenizeError> {
        let Some(closer) = self.brackets.top().map(|b| b.closer) else {
            return Err(self.unclosed());
        };
        let base = self.brackets.depth();
        let mut param = ParamBuf::new(self.here());

        loop {
            if self.pos >= self.line.len() {
                if !self.raw_next_line()? {
                    return Err(self.unclosed());
                }
                continue;
            }
            let c = self.line[self.pos];
            if self.brackets.depth() == base && c == closer {
                debug!(line = self.lnum, "captured proc macro argument");
                self.pending.push_back(param.into_token(&self.line_text));
                self.last_significant = Some(TokenKind::MacroParam);
                return Ok(());
            }
            match c {
                '\'' | '"' => {
                    self.raw_string(&mut param)?;
                    continue;
                }
                '(' | '[' | '{' | ')' | ']' | '}' => self.raw_bracket(c)?,
                _ => {}
            }
            param.push(c, self.here(), &self.line_text);
            self.pos += 1;
        }
    }

    /// Capture the body of `with! ctx:`.
    ///
    /// With text after the colon the rest of the logical line is captured
    /// verbatim, newline included. Otherwise every following line indented
    /// deeper than the statement is captured (blank lines included) and
    /// dedented. Either way the logical line is finished: no NEWLINE follows.
    fn capture_with_block(&mut self) -> Result<(), TokenizeError> {
        let rest = self.slice(self.pos, self.line.len());
        let trimmed = rest.trim();

        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            let start = self.here();
            let mut text = rest;
            while open_bracket_count(&text) > 0 || text.trim_end_matches(&['\n', '\r'][..]).ends_with('\\') {
                if !self.raw_next_line()? {
                    return Err(TokenizeError::EofInMultiLineStatement {
                        position: self.at(self.line.len()),
                    });
                }
                text.push_str(&self.line_text);
            }
            let end = self.at(self.line.len());
            self.emit(TokenKind::MacroParam, text, start, end);
            self.pos = self.line.len();
            self.last_significant = Some(TokenKind::Newline);
            self.line_tokens = 0;
            debug!(line = self.lnum, "captured with-macro line");
            return Ok(());
        }

        self.pos = self.line.len();
        let indent = self.current_indent();
        let mut lines: Vec<String> = Vec::new();
        let mut first_line = None;
        while let Some(text) = self.read_line()? {
            if is_blank_line(&text) {
                if first_line.is_some() {
                    lines.push(text.clone());
                }
                self.load_line(text);
                continue;
            }
            if indentation_column(&text, self.tabsize) <= indent {
                self.pushback = Some(text);
                break;
            }
            lines.push(text.clone());
            self.load_line(text);
            first_line.get_or_insert(self.lnum);
        }

        let Some(first_line) = first_line else {
            return Err(TokenizeError::ExpectedIndentedBlock {
                position: Position::new(self.lnum + 1, 0),
            });
        };
        let body = dedent(&lines.concat());
        let start = Position::new(first_line, 0);
        let end = self.at(self.line.len());
        self.emit(TokenKind::MacroParam, body, start, end);
        self.line.clear();
        self.pos = 0;
        self.last_significant = Some(TokenKind::Newline);
        self.line_tokens = 0;
        debug!(first_line, last_line = self.lnum, "captured with-macro block");
        Ok(())
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Any case and order of `b r u f br fr p pr pf`, or empty.
pub fn is_string_prefix(prefix: &str) -> bool {
    if prefix.len() > 2 {
        return false;
    }
    let mut chars: Vec<char> = prefix.to_ascii_lowercase().chars().collect();
    chars.sort_unstable();
    let sorted: String = chars.into_iter().collect();
    matches!(
        sorted.as_str(),
        "" | "b" | "r" | "u" | "f" | "p" | "br" | "fr" | "pr" | "fp"
    )
}

fn is_blank_line(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn indentation_column(text: &str, tabsize: usize) -> usize {
    let mut column = 0;
    for c in text.chars() {
        match c {
            ' ' => column += 1,
            '\t' => column = (column / tabsize + 1) * tabsize,
            '\x0c' => column = 0,
            _ => break,
        }
    }
    column
}

/// Net count of unclosed brackets, ignoring brackets inside quotes.
fn open_bracket_count(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '#' => break,
            _ => {}
        }
    }
    depth
}

/// Remove the whitespace prefix common to every non-blank line. Blank lines
/// become bare newlines.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => {
                let common = current
                    .char_indices()
                    .zip(indent.chars())
                    .find(|((_, a), b)| a != b)
                    .map_or(current.len().min(indent.len()), |((idx, _), _)| idx);
                &current[..common]
            }
        });
    }
    let margin = margin.unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if line.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Ws | TokenKind::Nl | TokenKind::Comment))
            .map(|t| t.kind)
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Ws | TokenKind::Nl | TokenKind::Comment))
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = Lexer::new("x = 1 + foo(2)\n").tokenize().unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Name));
        assert!(matches!(tokens[1].kind, TokenKind::Ws));
        assert!(tokens[2].is_exact_type("="));
        assert!(matches!(tokens[4].kind, TokenKind::Number));
        assert_eq!(
            texts("x = 1 + foo(2)\n"),
            vec!["x", "=", "1", "+", "foo", "(", "2", ")", "\n", ""]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            texts("0x1F 1_000 3.14 .5 1e-3 2j 7."),
            vec!["0x1F", "1_000", "3.14", ".5", "1e-3", "2j", "7.", "", ""]
        );
    }

    #[test]
    fn test_indentation() {
        let source = "if x:\n    y\n    if z:\n        w\nv\n";
        let k = kinds(source);
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Indent).count(), 2);
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Dedent).count(), 2);
        assert_eq!(k.last(), Some(&TokenKind::EndMarker));
    }

    #[test]
    fn test_bad_dedent() {
        let err = Lexer::new("if x:\n        y\n    z\n").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::Dedent { position } if position.line == 3));
    }

    #[test]
    fn test_tabs_advance_to_tabsize() {
        // a tab and eight spaces are the same level
        let k = kinds("if x:\n\ty\n        z\n");
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Indent).count(), 1);
    }

    #[test]
    fn test_continuation_lines() {
        let k = kinds("x = (1,\n     2)\ny = 1 + \\\n    2\n");
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Newline).count(), 2);
        assert!(!k.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_implicit_newline_at_eof() {
        let tokens = Lexer::new("x").tokenize().unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[1].text, "");
        assert_eq!(tokens[2].kind, TokenKind::EndMarker);
    }

    #[test]
    fn test_string_prefixes() {
        for prefix in ["", "r", "b", "Rb", "bR", "u", "p", "pr", "rP"] {
            let source = format!("{prefix}'x'");
            let k = kinds(&source);
            assert_eq!(k[0], TokenKind::String, "prefix {prefix:?}");
        }
        assert!(is_string_prefix("pf"));
        assert!(is_string_prefix("Fp"));
        assert!(!is_string_prefix("bu"));
        assert!(!is_string_prefix("print"));
    }

    #[test]
    fn test_path_prefix_adjacency() {
        assert_eq!(texts("p\"/foo\""), vec!["p\"/foo\"", "", ""]);
        assert_eq!(kinds("p \"/foo\"")[..2], [TokenKind::Name, TokenKind::String]);
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let tokens = Lexer::new("x = '''a\nb'''\n").tokenize().unwrap();
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string.text, "'''a\nb'''");
        assert_eq!(string.start, Position::new(1, 4));
        assert_eq!(string.end, Position::new(2, 4));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x = 'abc\n").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::UnterminatedString { .. }));
        let err = Lexer::new("x = '''abc\n").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::UnterminatedString { .. }));
    }

    #[test]
    fn test_fstring_nested() {
        let k = kinds("f'a{x:>{w}}b{f\"{y}\"}'");
        assert_eq!(
            k,
            vec![
                TokenKind::FStringStart,
                TokenKind::FStringMiddle,
                TokenKind::Op,
                TokenKind::Name,
                TokenKind::Op,
                TokenKind::FStringMiddle,
                TokenKind::Op,
                TokenKind::Name,
                TokenKind::Op,
                TokenKind::Op,
                TokenKind::FStringMiddle,
                TokenKind::Op,
                TokenKind::FStringStart,
                TokenKind::Op,
                TokenKind::Name,
                TokenKind::Op,
                TokenKind::FStringEnd,
                TokenKind::Op,
                TokenKind::FStringEnd,
                TokenKind::Newline,
                TokenKind::EndMarker,
            ]
        );
    }

    #[test]
    fn test_fstring_doubled_braces_are_text() {
        assert_eq!(texts("f'{{x}}'"), vec!["f'", "{{x}}", "'", "", ""]);
    }

    #[test]
    fn test_unterminated_fstring() {
        let err = Lexer::new("f'abc\n").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::UnterminatedFString { .. }));
    }

    #[test]
    fn test_subprocess_words() {
        assert_eq!(
            texts("$(ls -la | grep \"a)b\")"),
            vec!["$(", "ls", "-la", "|", "grep", "\"a)b\"", ")", "", ""]
        );
        let k = kinds("$[echo $HOME]");
        assert_eq!(
            k[..5],
            [TokenKind::Op, TokenKind::Word, TokenKind::Op, TokenKind::Name, TokenKind::Op]
        );
    }

    #[test]
    fn test_host_brackets_inside_subprocess() {
        assert_eq!(
            texts("$(echo @(f(x)) $(pwd))"),
            vec!["$(", "echo", "@(", "f", "(", "x", ")", ")", "$(", "pwd", ")", ")", "", ""]
        );
    }

    #[test]
    fn test_unclosed_subprocess() {
        let err = Lexer::new("$(ls\n").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::UnclosedBracket { opener: "$(", .. }));
    }

    #[test]
    fn test_search_paths() {
        assert_eq!(
            texts("g`*.rs` + `a.*` + @foo`x`"),
            vec!["g`*.rs`", "+", "`a.*`", "+", "@foo`x`", "", ""]
        );
        assert!(matches!(
            Lexer::new("`abc\n").tokenize(),
            Err(TokenizeError::UnterminatedSearchPath { .. })
        ));
    }

    fn macro_params(source: &str) -> Vec<String> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::MacroParam)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_call_macro_capture() {
        assert_eq!(macro_params("f!(a, (b,c), d)\n"), vec!["a", "(b,c)", "d"]);
        let tokens = Lexer::new("f!(x = ')' , [1,\n 2])\n").tokenize().unwrap();
        let params: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::MacroParam)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(params, vec!["x = ')'", "[1,\n 2]"]);
        assert!(tokens.iter().any(|t| t.is_exact_type(")")));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::EndMarker));
    }

    #[test]
    fn test_call_macro_needs_glued_name() {
        assert!(macro_params("f !(ls)\n").is_empty());
        assert!(macro_params("if!(ls)\n").is_empty());
        assert!(macro_params("f!()\n").is_empty());
    }

    #[test]
    fn test_proc_macro_capture() {
        assert_eq!(macro_params("$(echo -n ! x y )\n"), vec!["x y"]);
        assert_eq!(macro_params("![timeit!\"!)\"]\n"), vec!["\"!)\""]);
        assert_eq!(macro_params("$(echo!)\n"), vec![""]);
    }

    #[test]
    fn test_not_equal_is_not_a_proc_macro() {
        assert_eq!(
            texts("$(test a != b)\n"),
            vec!["$(", "test", "a", "!=", "b", ")", "\n", ""]
        );
        assert!(macro_params("$[x!=y]\n").is_empty());
        assert_eq!(macro_params("$(cmd! != b)\n"), vec!["!= b"]);
    }

    #[test]
    fn test_with_block_capture() {
        let tokens = Lexer::new("with! x:\n    a = 1\n\n    if a:\n        b\nc\n")
            .tokenize()
            .unwrap();
        let block = tokens.iter().find(|t| t.kind == TokenKind::MacroParam).unwrap();
        assert_eq!(block.text, "a = 1\n\nif a:\n    b\n");
        assert_eq!(block.start, Position::new(2, 0));
        let k = kinds("with! x:\n    a = 1\nc\n");
        assert!(!k.contains(&TokenKind::Indent));
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_with_line_capture() {
        assert_eq!(macro_params("with! x: y = [1,\n  2]\nz\n"), vec![" y = [1,\n  2]\n"]);
        assert!(matches!(
            Lexer::new("with! x:\ny\n").tokenize(),
            Err(TokenizeError::ExpectedIndentedBlock { .. })
        ));
        assert!(matches!(
            Lexer::new("with! x: y = [1,\n").tokenize(),
            Err(TokenizeError::EofInMultiLineStatement { .. })
        ));
        assert!(matches!(
            Lexer::new("with! x: y = 1 + \\\n").tokenize(),
            Err(TokenizeError::EofInMultiLineStatement { .. })
        ));
    }

    #[test]
    fn test_dedent_helper() {
        assert_eq!(dedent("    a\n      b\n\n    c\n"), "a\n  b\n\nc\n");
        assert_eq!(dedent("a\n"), "a\n");
    }
}
