//! String, f-string, path and search-path literals.
//!
//! # String prefixes
//!
//! The lexer only glues a prefix to a string when the two are physically
//! adjacent, so by the time a STRING token arrives here its prefix letters
//! are part of the token text. `p` turns the literal into a path, `f` into
//! an f-string, `r` disables escapes and `b` makes bytes.

use super::ast::{Constant, Expr, ExprKind, FStringPart, SearchKind, SearchPath};
use super::runtime::{PResult, Parser, RuleId};
use crate::tokenizer::{TokenInfo, TokenKind};

const STRINGS: RuleId = RuleId::new("strings");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringPrefix {
    pub raw: bool,
    pub bytes: bool,
    pub formatted: bool,
    pub path: bool,
}

impl StringPrefix {
    pub fn parse(prefix: &str) -> Self {
        let mut flags = StringPrefix::default();
        for c in prefix.chars() {
            match c.to_ascii_lowercase() {
                'r' => flags.raw = true,
                'b' => flags.bytes = true,
                'f' => flags.formatted = true,
                'p' => flags.path = true,
                _ => {}
            }
        }
        flags
    }
}

/// Split a STRING token into its prefix flags and the text between the
/// quotes.
pub fn split_string_token(text: &str) -> (StringPrefix, &str) {
    let body_start = text.find(&['\'', '"'][..]).unwrap_or(0);
    let prefix = StringPrefix::parse(&text[..body_start]);
    let quoted = &text[body_start..];
    let quote_len = if quoted.starts_with("'''") || quoted.starts_with("\"\"\"") {
        3
    } else {
        1
    };
    let body = quoted
        .get(quote_len..quoted.len().saturating_sub(quote_len))
        .unwrap_or("");
    (prefix, body)
}

/// Interpret backslash escapes. Unknown escapes are kept as written.
pub fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Decode a backtick search path token such as ``g`*.rs` `` or ``@foo`x` ``.
pub fn parse_search_path(text: &str) -> SearchPath {
    let tick = text.find('`').unwrap_or(0);
    let (prefix, rest) = text.split_at(tick);
    let pattern = rest
        .strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
        .unwrap_or(rest)
        .to_string();

    if let Some(name) = prefix.strip_prefix('@') {
        return SearchPath {
            kind: SearchKind::Custom(name.to_string()),
            pattern,
            as_paths: false,
            formatted: false,
        };
    }
    SearchPath {
        kind: if prefix.contains('g') {
            SearchKind::Glob
        } else {
            SearchKind::Regex
        },
        pattern,
        as_paths: prefix.contains('p'),
        formatted: prefix.contains('f'),
    }
}

/// Append `part`, merging neighbouring literal text.
fn push_part(parts: &mut Vec<FStringPart>, part: FStringPart) {
    if let FStringPart::Literal(text) = &part {
        if text.is_empty() {
            return;
        }
        if let Some(FStringPart::Literal(last)) = parts.last_mut() {
            last.push_str(text);
            return;
        }
    }
    parts.push(part);
}

/// Literal text of an FSTRING_MIDDLE with doubled braces collapsed.
fn fstring_text(tok: &TokenInfo, raw: bool) -> String {
    let text = tok.text.replace("{{", "{").replace("}}", "}");
    if raw {
        text
    } else {
        decode_escapes(&text)
    }
}

/// Characters of `line` between two columns.
fn columns(line: &str, from: usize, to: usize) -> String {
    line.chars().skip(from).take(to.saturating_sub(from)).collect()
}

impl Parser {
    /// strings: (STRING | fstring)+
    pub(crate) fn strings(&mut self) -> PResult<Expr> {
        self.memoize(STRINGS, Self::strings_body)
    }

    fn strings_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut count = 0;
        let mut formatted = false;
        let mut bytes = false;
        let mut path = false;

        loop {
            if let Some(tok) = self.expect_kind(TokenKind::String)? {
                let (prefix, body) = split_string_token(&tok.text);
                let value = if prefix.raw {
                    body.to_string()
                } else {
                    decode_escapes(body)
                };
                push_part(&mut parts, FStringPart::Literal(value));
                bytes |= prefix.bytes;
                path |= prefix.path;
            } else if let Some((prefix, fparts)) = self.fstring()? {
                for part in fparts {
                    push_part(&mut parts, part);
                }
                formatted = true;
                path |= prefix.path;
            } else {
                break;
            }
            count += 1;
        }
        if count == 0 {
            return Ok(None);
        }

        let span = self.span_from(start);
        let kind = if formatted {
            ExprKind::JoinedStr(parts)
        } else {
            let text = match parts.pop() {
                Some(FStringPart::Literal(text)) => text,
                _ => String::new(),
            };
            ExprKind::Constant(if bytes {
                Constant::Bytes(text)
            } else {
                Constant::Str(text)
            })
        };
        let literal = Expr::new(kind, span);
        if path {
            Ok(Some(Expr::new(ExprKind::Path(literal.boxed()), span)))
        } else {
            Ok(Some(literal))
        }
    }

    /// fstring: FSTRING_START (FSTRING_MIDDLE | replacement_field)* FSTRING_END
    fn fstring(&mut self) -> PResult<(StringPrefix, Vec<FStringPart>)> {
        let mark = self.mark();
        let Some(open) = self.expect_kind(TokenKind::FStringStart)? else {
            return Ok(None);
        };
        let prefix = StringPrefix::parse(open.text.trim_end_matches(&['\'', '"'][..]));
        match self.fstring_parts(prefix.raw)? {
            Some(parts) if self.expect_kind(TokenKind::FStringEnd)?.is_some() => {
                Ok(Some((prefix, parts)))
            }
            _ => {
                self.reset(mark);
                Ok(None)
            }
        }
    }

    /// Literal text and replacement fields up to (not including) the
    /// closing FSTRING_END or `}`.
    fn fstring_parts(&mut self, raw: bool) -> PResult<Vec<FStringPart>> {
        let mut parts = Vec::new();
        loop {
            if let Some(tok) = self.expect_kind(TokenKind::FStringMiddle)? {
                push_part(&mut parts, FStringPart::Literal(fstring_text(&tok, raw)));
            } else if let Some(field) = self.replacement_field(raw)? {
                parts.push(field);
            } else {
                return Ok(Some(parts));
            }
        }
    }

    /// replacement_field: '{' (yield_expr | star_expressions) '='? ['!' NAME] [':' spec] '}'
    fn replacement_field(&mut self, raw: bool) -> PResult<FStringPart> {
        let mark = self.mark();
        let Some(open) = self.expect("{")? else {
            return Ok(None);
        };
        let value = match self.yield_expr()? {
            Some(value) => Some(value),
            None => self.star_expressions()?,
        };
        let Some(value) = value else {
            self.reset(mark);
            return Ok(None);
        };

        let debug_text = self
            .expect("=")?
            .map(|eq| columns(&open.line, open.end.column, eq.end.column));

        let mut conversion = None;
        let before_conversion = self.mark();
        if let Some(bang) = self.expect("!")? {
            match self.name()? {
                Some(name) if name.is_next_to(&bang) && name.text.chars().count() == 1 => {
                    conversion = name.text.chars().next();
                }
                _ => self.reset(before_conversion),
            }
        }

        let mut format_spec = Vec::new();
        if self.expect(":")?.is_some() {
            match self.fstring_parts(raw)? {
                Some(spec) => format_spec = spec,
                None => {
                    self.reset(mark);
                    return Ok(None);
                }
            }
        }

        if self.expect("}")?.is_none() {
            self.reset(mark);
            return Ok(None);
        }
        Ok(Some(FStringPart::Field {
            value: value.boxed(),
            debug_text,
            conversion,
            format_spec,
        }))
    }

    /// search_path: SEARCH_PATH
    pub(crate) fn search_path(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let Some(tok) = self.expect_kind(TokenKind::SearchPath)? else {
            return Ok(None);
        };
        let search = parse_search_path(&tok.text);
        Ok(Some(Expr::new(ExprKind::SearchPath(search), self.span_from(start))))
    }
}
