//! Token records produced by the lexer.
//!
//! A [`TokenInfo`] is created once when a lexeme is recognized and never
//! mutated afterwards. Punctuation is always [`TokenKind::Op`]; grammar rules
//! tell operators apart by spelling through [`TokenInfo::is_exact_type`].

use std::fmt;
use std::sync::Arc;

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EndMarker,
    Name,
    Number,
    String,
    Newline,
    Indent,
    Dedent,
    Op,
    FStringStart,
    FStringMiddle,
    FStringEnd,
    ErrorToken,
    Comment,
    /// Non-logical newline (blank line, or a line break inside brackets).
    Nl,

    // Shell-language kinds
    /// Backtick path search, with its optional prefix: ``g`*.rs` ``.
    SearchPath,
    /// Raw text captured for a macro argument or a `with!` block.
    MacroParam,
    /// A whitespace run.
    Ws,
    /// A bare argument word inside a subprocess literal.
    Word,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::EndMarker => "ENDMARKER",
            TokenKind::Name => "NAME",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::Op => "OP",
            TokenKind::FStringStart => "FSTRING_START",
            TokenKind::FStringMiddle => "FSTRING_MIDDLE",
            TokenKind::FStringEnd => "FSTRING_END",
            TokenKind::ErrorToken => "ERRORTOKEN",
            TokenKind::Comment => "COMMENT",
            TokenKind::Nl => "NL",
            TokenKind::SearchPath => "SEARCH_PATH",
            TokenKind::MacroParam => "MACRO_PARAM",
            TokenKind::Ws => "WS",
            TokenKind::Word => "WORD",
        }
    }

    /// Zero-width or layout tokens skipped when looking for the end of the
    /// last real lexeme.
    pub fn is_layout(self) -> bool {
        matches!(
            self,
            TokenKind::EndMarker | TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source position: 1-based line, 0-based column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.column)
    }
}

/// An immutable token.
///
/// `end` is exclusive. Zero-width markers (INDENT at column 0, DEDENT,
/// ENDMARKER) have `start == end`.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub kind: TokenKind,
    pub text: String,
    pub start: Position,
    pub end: Position,
    /// Physical line the token starts on, kept for error reports.
    pub line: Arc<str>,
}

impl TokenInfo {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        start: Position,
        end: Position,
        line: Arc<str>,
    ) -> Self {
        debug_assert!(start <= end, "token {kind} ends before it starts");
        TokenInfo {
            kind,
            text: text.into(),
            start,
            end,
            line,
        }
    }

    /// True for an operator token spelled exactly `literal`.
    pub fn is_exact_type(&self, literal: &str) -> bool {
        self.kind == TokenKind::Op && self.text == literal
    }

    /// True when `prev` ends exactly where this token starts.
    pub fn is_next_to(&self, prev: &TokenInfo) -> bool {
        prev.end == self.start
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>({:?}) at {}", self.kind, self.text, self.start.line)
    }
}

/// Every operator spelling, longest first so a prefix never shadows a
/// longer operator.
pub static OPERATORS: &[&str] = &[
    "@$(", "**=", "//=", ">>=", "<<=", "...", "!=", "%=", "&=", "**", "*=", "+=", "-=", "->", "//",
    "/=", ":=", "<<", "<=", "==", ">=", ">>", "@=", "^=", "|=", "??", "||", "&&", "@(", "!(", "![",
    "$(", "$[", "${", ">&", "%", "&", "(", ")", "*", "+", ",", "-", ".", "/", ":", ";", "<", "=",
    ">", "@", "[", "]", "^", "{", "|", "}", "~", "!", "$", "?",
];

/// Operators that keep a meaning between argument words of a subprocess
/// literal. Everything else there is plain word text.
pub static ARGV_OPERATORS: &[&str] = &[
    "@$(", "$(", "$[", "${", "![", "!(", "@(", "!=", "||", "&&", ">>", ">&", "|", "&", ">", "<", "!",
    "(", ")", "[", "]", "{", "}",
];

pub static KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Longest entry of `table` that starts at `chars[pos..]`.
pub fn longest_match(table: &'static [&'static str], chars: &[char], pos: usize) -> Option<&'static str> {
    table.iter().copied().find(|op| {
        let mut len = 0;
        for (offset, expected) in op.chars().enumerate() {
            if chars.get(pos + offset) != Some(&expected) {
                return false;
            }
            len += 1;
        }
        len > 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str, start: (usize, usize), end: (usize, usize)) -> TokenInfo {
        TokenInfo::new(
            kind,
            text,
            Position::new(start.0, start.1),
            Position::new(end.0, end.1),
            Arc::from(""),
        )
    }

    #[test]
    fn test_exact_type_only_matches_operators() {
        let op = tok(TokenKind::Op, "(", (1, 0), (1, 1));
        let string = tok(TokenKind::String, "(", (1, 0), (1, 1));
        assert!(op.is_exact_type("("));
        assert!(!op.is_exact_type("["));
        assert!(!string.is_exact_type("("));
    }

    #[test]
    fn test_adjacency() {
        let prefix = tok(TokenKind::Name, "p", (1, 0), (1, 1));
        let glued = tok(TokenKind::String, "\"/foo\"", (1, 1), (1, 7));
        let spaced = tok(TokenKind::String, "\"/foo\"", (1, 2), (1, 8));
        assert!(glued.is_next_to(&prefix));
        assert!(!spaced.is_next_to(&prefix));
        assert!(!prefix.is_next_to(&glued));
    }

    #[test]
    fn test_longest_operator_wins() {
        let chars: Vec<char> = "@$(ls)".chars().collect();
        assert_eq!(longest_match(OPERATORS, &chars, 0), Some("@$("));
        let chars: Vec<char> = "**=".chars().collect();
        assert_eq!(longest_match(OPERATORS, &chars, 0), Some("**="));
        let chars: Vec<char> = "a".chars().collect();
        assert_eq!(longest_match(OPERATORS, &chars, 0), None);
    }

    #[test]
    fn test_operator_table_is_sorted_by_length() {
        for pair in OPERATORS.windows(2) {
            assert!(pair[0].chars().count() >= pair[1].chars().count(), "{pair:?}");
        }
        for pair in ARGV_OPERATORS.windows(2) {
            assert!(pair[0].chars().count() >= pair[1].chars().count(), "{pair:?}");
        }
    }
}
