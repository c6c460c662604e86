//! Packrat parsing runtime.
//!
//! Grammar rules are plain methods on [`Parser`] of the shape
//! `fn(&mut Parser) -> PResult<T>`. They explore alternatives with
//! [`Parser::mark`] / [`Parser::reset`], consume tokens with
//! [`Parser::expect`] and friends, and are wrapped in [`Parser::memoize`]
//! or [`Parser::memoize_left_rec`].
//!
//! # Results
//!
//! `Ok(Some(node))` is a match, `Ok(None)` a silent local failure that the
//! caller backtracks from, and `Err` aborts the whole parse (tokenize
//! errors, and syntax errors raised on purpose by diagnostic rules or
//! [`Parser::expect_forced`]).
//!
//! # Memoization
//!
//! Memo entries are keyed by `(RuleId, Mark)` and hold the rule's result
//! (failure included) together with the mark the rule ended at, so a
//! repeated call costs a table lookup and a reset. The table lives as long
//! as the parser and is only cleared before the diagnostic second pass.
//!
//! # Left recursion
//!
//! A left-recursive rule is seeded with a failure at its start mark and
//! then re-run: every run sees the previous, shorter result in the memo
//! table when it recurses into itself, so each run can add one more layer.
//! Growing stops as soon as a run fails or does not get past the previous
//! end.
//!
//! # Nesting
//!
//! Every bracketed construct recurses through the whole precedence chain,
//! so nesting depth is capped at [`MAX_NESTING`] and [`Parser::parse`] runs
//! the grammar on a thread with a [`PARSE_STACK_SIZE`] stack.

use super::error::{ErrorKind, ParseError, SyntaxError};
use crate::parser::ast::Span;
use crate::tokenizer::lexer::DEFAULT_TABSIZE;
use crate::tokenizer::{Mark, Position, TokenInfo, TokenKind, Tokenizer};
use crate::trace::{TraceEvent, TraceLog};
use rustc_hash::{FxHashMap, FxHashSet};
use std::any::Any;
use std::panic;
use std::thread;
use tracing::{debug, trace, warn};

/// Deepest bracket nesting accepted before a syntax error.
pub const MAX_NESTING: usize = 200;

/// Stack reserved for the thread a parse runs on.
pub const PARSE_STACK_SIZE: usize = 256 * 1024 * 1024;

pub type PResult<T> = Result<Option<T>, ParseError>;

/// A rule body.
pub type Rule<T> = fn(&mut Parser) -> PResult<T>;

/// One alternative of a rule that may contain a cut.
pub type Alt<T> = fn(&mut Parser, &mut Cut) -> PResult<T>;

/// Identity of a memoized rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(&'static str);

impl RuleId {
    pub const fn new(name: &'static str) -> Self {
        RuleId(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

/// Commit flag handed to each alternative by [`Parser::choice`].
///
/// Once an alternative calls [`Cut::commit`], its failure fails the whole
/// rule instead of falling through to the next alternative.
#[derive(Debug, Default)]
pub struct Cut {
    committed: bool,
}

impl Cut {
    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

/// Which entry rule a parse starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// A whole file: statements up to ENDMARKER.
    #[default]
    Exec,
    /// A single expression.
    Eval,
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Reported in syntax errors.
    pub filename: String,
    pub mode: Mode,
    /// Record every rule event into a [`TraceLog`].
    pub verbose: bool,
    /// Maximum number of recorded trace events.
    pub trace_limit: usize,
    /// Column width of a tab when measuring indentation.
    pub tabsize: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            filename: "<string>".to_string(),
            mode: Mode::Exec,
            verbose: false,
            trace_limit: 100_000,
            tabsize: DEFAULT_TABSIZE,
        }
    }
}

impl ParserOptions {
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_trace_limit(mut self, limit: usize) -> Self {
        self.trace_limit = limit;
        self
    }

    pub fn with_tabsize(mut self, tabsize: usize) -> Self {
        self.tabsize = tabsize;
        self
    }
}

/// Memo table counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: usize,
    pub misses: usize,
    pub grow_steps: usize,
}

struct MemoEntry {
    /// An `Option<T>` for the rule's node type `T`.
    value: Box<dyn Any + Send>,
    end: Mark,
}

pub struct Parser {
    tokenizer: Tokenizer,
    memo: FxHashMap<(RuleId, Mark), MemoEntry>,
    in_progress: FxHashSet<(RuleId, Mark)>,
    in_recursive_rule: usize,
    call_invalid_rules: bool,
    options: ParserOptions,
    level: usize,
    nesting: usize,
    trace: Option<TraceLog>,
    stats: MemoStats,
}

impl Parser {
    pub fn new(tokenizer: Tokenizer, options: ParserOptions) -> Self {
        let trace = options.verbose.then(|| TraceLog::new(options.trace_limit));
        Parser {
            tokenizer,
            memo: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            in_recursive_rule: 0,
            call_invalid_rules: false,
            options,
            level: 0,
            nesting: 0,
            trace,
            stats: MemoStats::default(),
        }
    }

    pub fn from_str(source: &str) -> Self {
        Self::new(Tokenizer::from_str(source), ParserOptions::default())
    }

    // ----- backtracking ------------------------------------------------

    pub fn mark(&self) -> Mark {
        self.tokenizer.mark()
    }

    pub fn reset(&mut self, mark: Mark) {
        self.tokenizer.reset(mark);
    }

    pub fn peek(&mut self) -> Result<&TokenInfo, ParseError> {
        Ok(self.tokenizer.peek()?)
    }

    /// Consume the next token whatever it is.
    pub fn advance(&mut self) -> Result<TokenInfo, ParseError> {
        Ok(self.tokenizer.getnext()?)
    }

    /// Consume the next token if it is an operator, keyword or word spelled
    /// `literal`.
    pub fn expect(&mut self, literal: &str) -> PResult<TokenInfo> {
        let tok = self.tokenizer.peek()?;
        let hit = matches!(tok.kind, TokenKind::Op | TokenKind::Name | TokenKind::Word)
            && tok.text == literal;
        if hit {
            Ok(Some(self.tokenizer.getnext()?))
        } else {
            Ok(None)
        }
    }

    /// Consume the next token if it has kind `kind`.
    pub fn expect_kind(&mut self, kind: TokenKind) -> PResult<TokenInfo> {
        if self.tokenizer.peek()?.kind == kind {
            Ok(Some(self.tokenizer.getnext()?))
        } else {
            Ok(None)
        }
    }

    /// A NAME that is not a keyword.
    pub fn name(&mut self) -> PResult<TokenInfo> {
        let tok = self.tokenizer.peek()?;
        if tok.kind == TokenKind::Name && !crate::tokenizer::token::is_keyword(&tok.text) {
            Ok(Some(self.tokenizer.getnext()?))
        } else {
            Ok(None)
        }
    }

    /// Turn a local failure into an `expected ...` syntax error right away.
    pub fn expect_forced<T>(&mut self, result: Option<T>, expectation: &str) -> Result<T, ParseError> {
        match result {
            Some(value) => Ok(value),
            None => Err(self.raise_at_furthest(&format!("expected {expectation}"))),
        }
    }

    pub fn positive_lookahead<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> Result<bool, ParseError> {
        let mark = self.mark();
        let found = rule(self)?.is_some();
        self.reset(mark);
        Ok(found)
    }

    pub fn negative_lookahead<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> Result<bool, ParseError> {
        Ok(!self.positive_lookahead(rule)?)
    }

    /// `rule*`
    pub fn repeated<T>(&mut self, rule: impl Fn(&mut Self) -> PResult<T>) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        loop {
            let mark = self.mark();
            match rule(self)? {
                Some(item) if self.mark() > mark => items.push(item),
                // a match that consumes nothing would repeat forever
                Some(item) => {
                    items.push(item);
                    break;
                }
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Ok(items)
    }

    /// `rule+`
    pub fn repeated1<T>(&mut self, rule: impl Fn(&mut Self) -> PResult<T>) -> PResult<Vec<T>> {
        let items = self.repeated(rule)?;
        Ok((!items.is_empty()).then_some(items))
    }

    /// `sep.rule+`: one or more `rule` separated by `sep`. A trailing
    /// separator is left unconsumed.
    pub fn gathered<T>(&mut self, sep: &str, rule: impl Fn(&mut Self) -> PResult<T>) -> PResult<Vec<T>> {
        let Some(first) = rule(self)? else {
            return Ok(None);
        };
        let mut items = vec![first];
        loop {
            let mark = self.mark();
            if self.expect(sep)?.is_none() {
                break;
            }
            match rule(self)? {
                Some(item) => items.push(item),
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Ok(Some(items))
    }

    /// Ordered choice over alternatives that may cut.
    pub fn choice<T>(&mut self, alternatives: &[Alt<T>]) -> PResult<T> {
        let mark = self.mark();
        for alt in alternatives {
            let mut cut = Cut::default();
            if let Some(node) = alt(self, &mut cut)? {
                return Ok(Some(node));
            }
            self.reset(mark);
            if cut.is_committed() {
                break;
            }
        }
        Ok(None)
    }

    /// Run `rule` one bracket level deeper. Past [`MAX_NESTING`] levels the
    /// parse stops with `too many nested parentheses` at the next token.
    pub fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.nesting >= MAX_NESTING {
            let tok = self.peek()?.clone();
            return Err(self.raise_error_at("too many nested parentheses", &tok));
        }
        self.nesting += 1;
        let result = rule(self);
        self.nesting -= 1;
        result
    }

    // ----- memoization -------------------------------------------------

    fn memo_lookup<T: Clone + Send + 'static>(&mut self, rule: RuleId, mark: Mark) -> Result<Option<Option<T>>, ParseError> {
        let Some(entry) = self.memo.get(&(rule, mark)) else {
            return Ok(None);
        };
        let end = entry.end;
        let value = entry
            .value
            .downcast_ref::<Option<T>>()
            .cloned()
            .ok_or(ParseError::MemoType { rule: rule.name() })?;
        self.stats.hits += 1;
        trace!(rule = rule.name(), mark, end, "memo hit");
        self.record(TraceEvent::MemoHit {
            rule: rule.name(),
            mark,
            end,
            matched: value.is_some(),
            depth: self.level,
        });
        self.reset(end);
        Ok(Some(value))
    }

    fn memo_store<T: Clone + Send + 'static>(&mut self, rule: RuleId, mark: Mark, value: &Option<T>, end: Mark) {
        self.memo.insert(
            (rule, mark),
            MemoEntry {
                value: Box::new(value.clone()),
                end,
            },
        );
    }

    fn enter(&mut self, rule: RuleId, mark: Mark) {
        trace!(rule = rule.name(), mark, depth = self.level, "enter");
        self.record(TraceEvent::Enter {
            rule: rule.name(),
            mark,
            depth: self.level,
        });
        self.level += 1;
    }

    fn exit(&mut self, rule: RuleId, mark: Mark, matched: bool) {
        self.level = self.level.saturating_sub(1);
        let end = self.mark();
        trace!(rule = rule.name(), mark, end, matched, "exit");
        self.record(TraceEvent::Exit {
            rule: rule.name(),
            mark,
            end,
            matched,
            depth: self.level,
        });
    }

    fn record(&mut self, event: TraceEvent) {
        if let Some(log) = self.trace.as_mut() {
            log.push(event);
        }
    }

    /// Run `body` at most once per position.
    pub fn memoize<T: Clone + Send + 'static>(&mut self, rule: RuleId, body: Rule<T>) -> PResult<T> {
        let mark = self.mark();
        if let Some(hit) = self.memo_lookup(rule, mark)? {
            return Ok(hit);
        }
        if !self.in_progress.insert((rule, mark)) {
            warn!(
                rule = rule.name(),
                mark, "rule re-entered at the same position; treating it as a failure"
            );
            return Ok(None);
        }
        self.stats.misses += 1;
        self.enter(rule, mark);
        let result = body(self);
        self.in_progress.remove(&(rule, mark));
        let value = result?;
        if value.is_none() {
            self.reset(mark);
        }
        let end = self.mark();
        self.memo_store(rule, mark, &value, end);
        self.exit(rule, mark, value.is_some());
        Ok(value)
    }

    /// Run a left-recursive `body`, growing its match from a failed seed.
    ///
    /// Mutual recursion works when only the leader of the cycle goes
    /// through `memoize_left_rec` and the other rules of the cycle are not
    /// memoized at all: a memoized follower would cache the seed failure
    /// and stop the growth.
    pub fn memoize_left_rec<T: Clone + Send + 'static>(&mut self, rule: RuleId, body: Rule<T>) -> PResult<T> {
        let mark = self.mark();
        if let Some(hit) = self.memo_lookup(rule, mark)? {
            return Ok(hit);
        }
        self.stats.misses += 1;
        self.enter(rule, mark);
        self.memo_store::<T>(rule, mark, &None, mark);

        self.in_recursive_rule += 1;
        let mut last_result: Option<T> = None;
        let mut last_end = mark;
        let outcome = loop {
            self.reset(mark);
            let result = match body(self) {
                Ok(result) => result,
                Err(err) => break Err(err),
            };
            let end = self.mark();
            if result.is_none() || end <= last_end {
                break Ok(());
            }
            self.stats.grow_steps += 1;
            trace!(rule = rule.name(), mark, end, "grow");
            self.record(TraceEvent::Grow {
                rule: rule.name(),
                mark,
                end,
                depth: self.level,
            });
            self.memo_store(rule, mark, &result, end);
            last_result = result;
            last_end = end;
        };
        self.in_recursive_rule -= 1;
        outcome?;

        self.reset(last_end);
        self.exit(rule, mark, last_result.is_some());
        Ok(last_result)
    }

    // ----- locations and errors ----------------------------------------

    /// Span from the token at `start` to the end of the last real token
    /// consumed.
    pub fn span_from(&self, start: Mark) -> Span {
        let tokens = self.tokenizer.tokens();
        let begin = tokens
            .get(start)
            .or_else(|| tokens.last())
            .map_or_else(Position::default, |t| t.start);
        let end = self
            .tokenizer
            .get_last_non_whitespace_token()
            .map_or(begin, |t| t.end)
            .max(begin);
        Span::new(begin, end)
    }

    pub fn call_invalid_rules(&self) -> bool {
        self.call_invalid_rules
    }

    /// How deep in left-recursive rules the parser currently is.
    pub fn in_recursive_rule(&self) -> usize {
        self.in_recursive_rule
    }

    fn line_text(&mut self, line: usize) -> String {
        self.tokenizer.get_lines(&[line]).pop().unwrap_or_default()
    }

    /// A syntax error covering `start..end`.
    pub fn raise_error_range(&mut self, message: &str, start: Position, end: Position) -> ParseError {
        let line_text = self.line_text(start.line);
        ParseError::Syntax(SyntaxError {
            kind: ErrorKind::Syntax,
            message: message.to_string(),
            filename: self.options.filename.clone(),
            start,
            end,
            line_text,
        })
    }

    /// A syntax error at a known token.
    pub fn raise_error_at(&mut self, message: &str, tok: &TokenInfo) -> ParseError {
        self.raise_error_range(message, tok.start, tok.end)
    }

    /// A syntax error at a known node.
    pub fn raise_error_span(&mut self, message: &str, span: Span) -> ParseError {
        self.raise_error_range(message, span.start, span.end)
    }

    /// A syntax error at the furthest token read so far.
    pub fn raise_at_furthest(&mut self, message: &str) -> ParseError {
        let diagnosis = self.tokenizer.diagnose();
        let at = Position::new(diagnosis.line, diagnosis.column);
        let (start, end) = diagnosis.token.map_or((at, at), |t| (t.start, t.end));
        self.raise_error_range(message, start, end)
    }

    /// An `IndentationError` at `tok`.
    pub fn raise_indentation_error(&mut self, message: &str, tok: &TokenInfo) -> ParseError {
        match self.raise_error_at(message, tok) {
            ParseError::Syntax(mut err) => {
                err.kind = ErrorKind::Indentation;
                ParseError::Syntax(err)
            }
            other => other,
        }
    }

    fn syntax_error_from(&mut self, err: ParseError) -> SyntaxError {
        match err {
            ParseError::Syntax(err) => err,
            ParseError::Tokenize(err) => {
                let kind = if err.is_indentation() {
                    ErrorKind::Indentation
                } else {
                    ErrorKind::Tokenize
                };
                let position = err.position().unwrap_or_else(|| {
                    let diagnosis = self.tokenizer.diagnose();
                    Position::new(diagnosis.line, diagnosis.column)
                });
                let line_text = self.line_text(position.line);
                SyntaxError {
                    kind,
                    message: err.to_string(),
                    filename: self.options.filename.clone(),
                    start: position,
                    end: position,
                    line_text,
                }
            }
            err @ ParseError::MemoType { .. } => SyntaxError {
                kind: ErrorKind::Syntax,
                message: err.to_string(),
                filename: self.options.filename.clone(),
                start: Position::default(),
                end: Position::default(),
                line_text: String::new(),
            },
        }
    }

    /// Run `entry` to completion, with a diagnostic second pass on failure.
    ///
    /// The second pass starts from scratch with `call_invalid_rules` set so
    /// the invalid-syntax rules can raise a precise error. If none does,
    /// the error is `invalid syntax` at the furthest token the first pass
    /// reached.
    pub fn parse<T: Clone + Send + 'static>(&mut self, entry: Rule<T>) -> Result<T, SyntaxError> {
        match self.run_entry(entry) {
            Ok(Some(tree)) => return Ok(tree),
            Ok(None) => {}
            Err(err) => return Err(self.syntax_error_from(err)),
        }

        let diagnosis = self.tokenizer.diagnose();
        debug!(
            line = diagnosis.line,
            column = diagnosis.column,
            "first pass failed; reparsing with diagnostic rules"
        );
        self.record(TraceEvent::SecondPass);
        self.reset(0);
        self.memo.clear();
        self.in_progress.clear();
        self.level = 0;
        self.nesting = 0;
        self.call_invalid_rules = true;

        match self.run_entry(entry) {
            Err(err) => Err(self.syntax_error_from(err)),
            Ok(_) => {
                let (start, end, line_text) = match diagnosis.token {
                    Some(tok) => (tok.start, tok.end, tok.line.to_string()),
                    None => {
                        let at = Position::new(diagnosis.line, diagnosis.column);
                        (at, at, diagnosis.line_text)
                    }
                };
                Err(SyntaxError {
                    kind: ErrorKind::Syntax,
                    message: "invalid syntax".to_string(),
                    filename: self.options.filename.clone(),
                    start,
                    end,
                    line_text,
                })
            }
        }
    }

    /// Run `entry` on a thread with a [`PARSE_STACK_SIZE`] stack, or on the
    /// caller's stack if no such thread can be spawned.
    fn run_entry<T: Send>(&mut self, entry: Rule<T>) -> PResult<T> {
        let spawned = thread::scope(|scope| {
            thread::Builder::new()
                .name("xonsh-parse".to_string())
                .stack_size(PARSE_STACK_SIZE)
                .spawn_scoped(scope, || entry(self))
                .map(|handle| handle.join())
        });
        match spawned {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(err) => {
                warn!(%err, "could not spawn the parse thread; parsing on the current stack");
                entry(self)
            }
        }
    }

    // ----- inspection --------------------------------------------------

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }

    pub fn take_trace(&mut self) -> Option<TraceLog> {
        self.trace.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERM: RuleId = RuleId::new("term");
    const SUM: RuleId = RuleId::new("sum");

    /// `sum: sum '+' term | term`, built as nested strings.
    fn sum(p: &mut Parser) -> PResult<String> {
        p.memoize_left_rec(SUM, sum_body)
    }

    fn sum_body(p: &mut Parser) -> PResult<String> {
        let mark = p.mark();
        if let Some(left) = sum(p)? {
            if p.expect("+")?.is_some() {
                if let Some(right) = term(p)? {
                    return Ok(Some(format!("({left}+{right})")));
                }
            }
        }
        p.reset(mark);
        term(p)
    }

    fn term(p: &mut Parser) -> PResult<String> {
        p.memoize(TERM, |p| Ok(p.name()?.map(|t| t.text)))
    }

    #[test]
    fn test_left_recursion_is_left_associative() {
        let mut p = Parser::from_str("a+b+c");
        assert_eq!(sum(&mut p).unwrap().as_deref(), Some("((a+b)+c)"));
        assert!(p.stats().grow_steps >= 3);
        assert_eq!(p.in_recursive_rule(), 0);
    }

    #[test]
    fn test_memo_hit_reads_no_tokens() {
        let mut p = Parser::from_str("a+b");
        let first = sum(&mut p).unwrap();
        let end = p.mark();
        let reads = p.tokenizer().reads();
        p.reset(0);
        let second = sum(&mut p).unwrap();
        assert_eq!(first, second);
        assert_eq!(p.mark(), end);
        assert_eq!(p.tokenizer().reads(), reads);
    }

    #[test]
    fn test_failure_is_memoized_without_consuming() {
        let mut p = Parser::from_str("+");
        assert!(term(&mut p).unwrap().is_none());
        assert_eq!(p.mark(), 0);
        assert_eq!(p.memo_len(), 1);
        assert!(term(&mut p).unwrap().is_none());
        assert_eq!(p.stats().hits, 1);
    }

    fn cut_first(p: &mut Parser, cut: &mut Cut) -> PResult<&'static str> {
        if p.expect("(")?.is_none() {
            return Ok(None);
        }
        cut.commit();
        Ok(p.expect(")")?.map(|_| "parens"))
    }

    fn fallback(p: &mut Parser, _cut: &mut Cut) -> PResult<&'static str> {
        Ok(p.expect("(")?.map(|_| "open"))
    }

    #[test]
    fn test_cut_skips_remaining_alternatives() {
        let mut p = Parser::from_str("( x");
        assert_eq!(p.choice(&[cut_first, fallback]).unwrap(), None);
        assert_eq!(p.mark(), 0);

        let mut p = Parser::from_str("()");
        assert_eq!(p.choice(&[cut_first, fallback]).unwrap(), Some("parens"));

        let mut p = Parser::from_str("[");
        assert_eq!(p.choice(&[cut_first, fallback]).unwrap(), None);
    }

    #[test]
    fn test_gathered_leaves_trailing_separator() {
        let mut p = Parser::from_str("a, b, c,");
        let names = p.gathered(",", |p| Ok(p.name()?.map(|t| t.text))).unwrap();
        assert_eq!(names, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));
        assert!(p.peek().unwrap().is_exact_type(","));
    }

    #[test]
    fn test_expect_forced_reports_furthest_token() {
        let mut p = Parser::from_str("a b");
        p.name().unwrap();
        let missing = p.expect(":").unwrap();
        let err = p.expect_forced(missing, "':'").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax(SyntaxError { ref message, start, .. })
                if message == "expected ':'" && start == Position::new(1, 2)
        ));
    }

    #[test]
    fn test_nested_stops_at_the_limit() {
        let mut p = Parser::from_str("a");
        p.nesting = MAX_NESTING - 1;
        assert_eq!(p.nested(|p| Ok(p.name()?.map(|t| t.text))).unwrap().as_deref(), Some("a"));
        assert_eq!(p.nesting, MAX_NESTING - 1);

        p.reset(0);
        p.nesting = MAX_NESTING;
        let err = p.nested(|p| Ok(p.name()?.map(|t| t.text))).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax(SyntaxError { ref message, .. })
                if message == "too many nested parentheses"
        ));
        assert_eq!(p.mark(), 0);
    }
}
