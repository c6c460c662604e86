// Integration tests for the buffered token stream

use proptest::prelude::*;
use std::fs;
use xonsh_parser::tokenizer::{tokenize_all, Lexer, Position, TokenKind, TokenizeError, Tokenizer};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize_all(source)
        .expect("tokenize failed")
        .iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_layout_tokens_for_a_block() {
    let source = "if x:\n    # comment\n\n    y = 1\nz\n";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Name,
            TokenKind::Name,
            TokenKind::Op,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Name,
            TokenKind::Op,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Name,
            TokenKind::Newline,
            TokenKind::EndMarker,
        ]
    );
}

#[test]
fn test_raw_stream_keeps_whitespace_and_comments() {
    let raw = Lexer::new("x = 1  # one\n").tokenize().expect("tokenize failed");
    assert!(raw.iter().any(|t| t.kind == TokenKind::Ws));
    assert!(raw.iter().any(|t| t.kind == TokenKind::Comment && t.text == "# one"));
    let buffered = kinds("x = 1  # one\n");
    assert!(!buffered.contains(&TokenKind::Ws));
    assert!(!buffered.contains(&TokenKind::Comment));
}

#[test]
fn test_last_real_token_across_layout() {
    let mut tokenizer = Tokenizer::from_str("def f():\n    pass\n");
    assert!(tokenizer.get_last_non_whitespace_token().is_none());
    // def f ( ) : NEWLINE INDENT
    for _ in 0..7 {
        tokenizer.getnext().expect("tokenize failed");
    }
    let last = tokenizer
        .get_last_non_whitespace_token()
        .expect("a real token was read");
    assert!(last.is_exact_type(":"));

    let mark = tokenizer.mark();
    tokenizer.reset(2);
    assert_eq!(
        tokenizer.get_last_non_whitespace_token().map(|t| t.text.as_str()),
        Some("f")
    );
    tokenizer.reset(mark);
    assert!(tokenizer
        .get_last_non_whitespace_token()
        .is_some_and(|t| t.is_exact_type(":")));
}

#[test]
fn test_reset_replays_the_same_tokens() {
    let mut tokenizer = Tokenizer::from_str("a.b(c)\n");
    let first: Vec<_> = (0..5).map(|_| tokenizer.getnext().unwrap()).collect();
    tokenizer.reset(0);
    let again: Vec<_> = (0..5).map(|_| tokenizer.getnext().unwrap()).collect();
    assert_eq!(first, again);
    assert_eq!(tokenizer.tokens().len(), 5);
    assert_eq!(tokenizer.reads(), 10);
}

#[test]
fn test_diagnose_points_at_furthest_token() {
    let mut tokenizer = Tokenizer::from_str("x = (1,\n     2 3)\n");
    while tokenizer.getnext().unwrap().text != "3" {}
    tokenizer.reset(0);
    let diagnosis = tokenizer.diagnose();
    assert_eq!((diagnosis.line, diagnosis.column), (2, 7));
    assert_eq!(diagnosis.line_text, "     2 3)\n");
    assert_eq!(tokenizer.mark(), 0);
}

#[test]
fn test_get_lines_rereads_the_file() {
    let path = std::env::temp_dir().join(format!("xonsh-parser-lines-{}.xsh", std::process::id()));
    fs::write(&path, "a = 1\nb = 2\nc = 3\n").unwrap();
    let mut tokenizer = Tokenizer::from_path(&path, 8).unwrap();
    tokenizer.getnext().unwrap();
    assert_eq!(tokenizer.filename(), Some(path.as_path()));
    assert_eq!(tokenizer.get_lines(&[1, 3]), vec!["a = 1\n", "c = 3\n"]);
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_errors_carry_positions() {
    let err = tokenize_all("x = (1,\n").unwrap_err();
    assert!(matches!(err, TokenizeError::UnclosedBracket { opener: "(", .. }));
    assert_eq!(err.position(), Some(Position::new(1, 4)));

    let err = tokenize_all("if x:\n        a\n    b\n").unwrap_err();
    assert!(matches!(err, TokenizeError::Dedent { .. }));
}

#[test]
fn test_subprocess_argv_words() {
    let tokens = tokenize_all("$(ls -la ./src)\n").unwrap();
    let words: Vec<&str> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Word)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(words, vec!["ls", "-la", "./src"]);
}

proptest! {
    /// An operator is adjacent to its left operand exactly when no
    /// whitespace separates them, whatever the spacing elsewhere.
    #[test]
    fn prop_adjacency_follows_whitespace(
        names in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 2..6),
        gaps in proptest::collection::vec((0usize..3, 0usize..3), 5),
    ) {
        prop_assume!(names.iter().all(|n| !xonsh_parser::tokenizer::token::is_keyword(n)));
        let mut source = names[0].clone();
        for (i, name) in names.iter().enumerate().skip(1) {
            let (before, after) = gaps[i - 1];
            source.push_str(&" ".repeat(before));
            source.push('+');
            source.push_str(&" ".repeat(after));
            source.push_str(name);
        }
        source.push('\n');

        let tokens = tokenize_all(&source).unwrap();
        for i in 1..names.len() {
            let (before, after) = gaps[i - 1];
            let operand = &tokens[2 * (i - 1)];
            let plus = &tokens[2 * i - 1];
            let next = &tokens[2 * i];
            prop_assert!(plus.is_exact_type("+"));
            prop_assert_eq!(plus.is_next_to(operand), before == 0);
            prop_assert_eq!(next.is_next_to(plus), after == 0);
            prop_assert_eq!(next.start.column - plus.end.column, after);
        }
    }
}
