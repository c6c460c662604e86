// Integration tests for the packrat runtime, driven by a small grammar
// written against the public rule API.

use proptest::prelude::*;
use xonsh_parser::parser::runtime::{Cut, PResult, Parser, ParserOptions, RuleId};
use xonsh_parser::tokenizer::{TokenKind, Tokenizer};

const DIFF: RuleId = RuleId::new("diff");
const ITEM: RuleId = RuleId::new("item");
const CHAIN: RuleId = RuleId::new("chain");

fn parser(source: &str) -> Parser {
    Parser::new(Tokenizer::from_str(source), ParserOptions::default())
}

/// diff: diff '-' item | item
fn diff(p: &mut Parser) -> PResult<String> {
    p.memoize_left_rec(DIFF, |p| {
        let mark = p.mark();
        if let Some(left) = diff(p)? {
            if p.expect("-")?.is_some() {
                if let Some(right) = item(p)? {
                    return Ok(Some(format!("({left}-{right})")));
                }
            }
        }
        p.reset(mark);
        item(p)
    })
}

/// item: NUMBER | '(' ~ diff ')' | NAME | '('
fn item(p: &mut Parser) -> PResult<String> {
    p.memoize(ITEM, |p| p.choice(&[number, group, name, bare_open]))
}

fn number(p: &mut Parser, _cut: &mut Cut) -> PResult<String> {
    Ok(p.expect_kind(TokenKind::Number)?.map(|t| t.text))
}

fn group(p: &mut Parser, cut: &mut Cut) -> PResult<String> {
    if p.expect("(")?.is_none() {
        return Ok(None);
    }
    cut.commit();
    let Some(inner) = diff(p)? else {
        return Ok(None);
    };
    Ok(p.expect(")")?.map(|_| inner))
}

fn name(p: &mut Parser, _cut: &mut Cut) -> PResult<String> {
    Ok(p.name()?.map(|t| t.text))
}

/// Only reachable when `group` fails before its cut.
fn bare_open(p: &mut Parser, _cut: &mut Cut) -> PResult<String> {
    Ok(p.expect("(")?.map(|t| t.text))
}

/// line: diff NEWLINE
fn line(p: &mut Parser) -> PResult<String> {
    let Some(tree) = diff(p)? else {
        return Ok(None);
    };
    Ok(p.expect_kind(TokenKind::Newline)?.map(|_| tree))
}

/// chain: operand '-' NUMBER | NUMBER
fn chain(p: &mut Parser) -> PResult<String> {
    p.memoize_left_rec(CHAIN, |p| {
        let mark = p.mark();
        if let Some(left) = operand(p)? {
            if p.expect("-")?.is_some() {
                if let Some(right) = p.expect_kind(TokenKind::Number)? {
                    return Ok(Some(format!("({left}-{})", right.text)));
                }
            }
        }
        p.reset(mark);
        Ok(p.expect_kind(TokenKind::Number)?.map(|t| t.text))
    })
}

/// operand: chain
///
/// Part of the `chain` cycle, so it is left unmemoized.
fn operand(p: &mut Parser) -> PResult<String> {
    chain(p)
}

#[test]
fn test_left_recursion_nests_left() {
    let mut p = parser("1 - 2 - (3 - 4) - x\n");
    assert_eq!(
        diff(&mut p).unwrap().as_deref(),
        Some("(((1-2)-(3-4))-x)")
    );
    assert!(p.stats().grow_steps >= 4);
    assert_eq!(p.in_recursive_rule(), 0);
}

#[test]
fn test_mutual_left_recursion_through_the_leader() {
    let mut p = parser("1-2-3\n");
    assert_eq!(chain(&mut p).unwrap().as_deref(), Some("((1-2)-3)"));
    assert!(p.expect_kind(TokenKind::Newline).unwrap().is_some());
    assert_eq!(p.in_recursive_rule(), 0);

    let mut p = parser("7\n");
    assert_eq!(chain(&mut p).unwrap().as_deref(), Some("7"));
}

#[test]
fn test_memoized_call_is_idempotent() {
    let mut p = parser("a - b - c\n");
    let first = diff(&mut p).unwrap();
    let end = p.mark();
    let entries = p.memo_len();
    let reads = p.tokenizer().reads();

    p.reset(0);
    let second = diff(&mut p).unwrap();
    assert_eq!(first, second);
    assert_eq!(p.mark(), end);
    assert_eq!(p.memo_len(), entries);
    assert_eq!(p.tokenizer().reads(), reads);
}

#[test]
fn test_failure_restores_the_mark() {
    let mut p = parser("- 1\n");
    assert_eq!(diff(&mut p).unwrap(), None);
    assert_eq!(p.mark(), 0);
    assert_eq!(item(&mut p).unwrap(), None);
    assert_eq!(p.mark(), 0);
}

#[test]
fn test_cut_stops_the_choice() {
    // `(` commits to the group alternative, so `bare_open` is never tried
    // and the item fails as a whole.
    let mut p = parser("( 1 2 )\n");
    assert_eq!(item(&mut p).unwrap(), None);
    assert_eq!(p.mark(), 0);
}

#[test]
fn test_two_pass_parse_reports_furthest_token() {
    let mut p = parser("1 - (2 - 3 4)\n");
    let err = p.parse(line).unwrap_err();
    assert_eq!(err.message, "invalid syntax");
    assert_eq!((err.start.line, err.start.column), (1, 11));
    assert!(p.call_invalid_rules());
}

#[test]
fn test_forced_expectation_raises_immediately() {
    fn block(p: &mut Parser) -> PResult<String> {
        let Some(head) = p.name()? else {
            return Ok(None);
        };
        let colon = p.expect(":")?;
        p.expect_forced(colon, "':'")?;
        Ok(Some(head.text))
    }
    let mut p = parser("when x\n");
    let err = p.parse(block).unwrap_err();
    assert_eq!(err.message, "expected ':'");
    assert!(!p.call_invalid_rules());
}

proptest! {
    /// Whatever the spacing, a chain of subtractions nests to the left, and
    /// asking again from the start answers from the memo table alone.
    #[test]
    fn prop_chain_nests_left_and_memo_is_stable(
        numbers in proptest::collection::vec(0u32..1000, 1..12),
        spaced in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let mut source = numbers[0].to_string();
        for (i, n) in numbers.iter().enumerate().skip(1) {
            source.push_str(if spaced[i] { " - " } else { "-" });
            source.push_str(&n.to_string());
        }
        source.push('\n');

        let expected = numbers[1..]
            .iter()
            .fold(numbers[0].to_string(), |acc, n| format!("({acc}-{n})"));

        let mut p = parser(&source);
        let tree = diff(&mut p).unwrap();
        prop_assert_eq!(tree.as_deref(), Some(expected.as_str()));
        let end = p.mark();
        let entries = p.memo_len();

        p.reset(0);
        let again = diff(&mut p).unwrap();
        prop_assert_eq!(again.as_deref(), Some(expected.as_str()));
        prop_assert_eq!(p.mark(), end);
        prop_assert_eq!(p.memo_len(), entries);
    }
}
