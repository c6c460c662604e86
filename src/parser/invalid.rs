//! Diagnostic rules for the second pass.
//!
//! These only run once the first pass has failed and
//! [`Parser::call_invalid_rules`] is set. Each one either recognizes a
//! common mistake and raises a precise error, or leaves the stream where
//! it found it and returns `Ok(())` so the real rule can carry on.

use super::ast::{Expr, ExprKind};
use super::error::ParseError;
use super::runtime::Parser;
use crate::tokenizer::{TokenInfo, TokenKind};

/// The first part of an assignment target that cannot be assigned to.
fn first_invalid_target(expr: &Expr) -> Option<&Expr> {
    match &expr.kind {
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            items.iter().find_map(first_invalid_target)
        }
        ExprKind::Starred(inner) => first_invalid_target(inner),
        kind if kind.is_assignable() => None,
        _ => Some(expr),
    }
}

impl Parser {
    /// invalid_assignment:
    ///     | (star_expressions '=')+ where a target is not assignable
    ///     | star_expressions augassign where the target is not a single target
    pub(crate) fn invalid_assignment(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        loop {
            let Some(target) = self.star_expressions()? else {
                break;
            };
            if self.expect("=")?.is_none() {
                let is_augmented = self.augassign()?.is_some();
                let single = matches!(
                    target.kind,
                    ExprKind::Name(_)
                        | ExprKind::Attribute { .. }
                        | ExprKind::Subscript { .. }
                        | ExprKind::Env(_)
                        | ExprKind::EnvExpr(_)
                );
                if is_augmented && !single {
                    let message = format!(
                        "'{}' is an illegal expression for augmented assignment",
                        target.kind.describe()
                    );
                    return Err(self.raise_error_span(&message, target.span));
                }
                break;
            }
            if let Some(bad) = first_invalid_target(&target) {
                let message = format!("cannot assign to {}", bad.kind.describe());
                return Err(self.raise_error_span(&message, bad.span));
            }
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_named_expression: expression ':=' expression
    pub(crate) fn invalid_named_expression(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        if let Some(target) = self.bitwise_or()? {
            if self.expect(":=")?.is_some() && !matches!(target.kind, ExprKind::Name(_)) {
                let message = format!(
                    "cannot use assignment expressions with {}",
                    target.kind.describe()
                );
                return Err(self.raise_error_span(&message, target.span));
            }
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_expression: disjunction 'if' disjunction !('else' | ':')
    pub(crate) fn invalid_expression(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        if self.disjunction()?.is_some() {
            if self.expect("if")?.is_some() && self.disjunction()?.is_some() {
                let next = self.peek()?;
                let has_else = next.kind == TokenKind::Name && next.text == "else";
                if !has_else && !next.is_exact_type(":") {
                    let span = self.span_from(start);
                    return Err(self.raise_error_span("expected 'else' after 'if' expression", span));
                }
            }
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_double_starred: a dict entry written `key:` with no value.
    pub(crate) fn invalid_double_starred(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        loop {
            let item_start = self.mark();
            if self.double_starred_kvpair()?.is_some() {
                if self.expect(",")?.is_some() {
                    continue;
                }
                break;
            }
            self.reset(item_start);
            if self.expression()?.is_some() {
                if let Some(colon) = self.expect(":")? {
                    let next = self.peek()?;
                    if next.is_exact_type("}") || next.is_exact_type(",") {
                        return Err(self.raise_error_at(
                            "expression expected after dictionary key and ':'",
                            &colon,
                        ));
                    }
                }
            }
            break;
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_block: NEWLINE !INDENT
    pub(crate) fn invalid_block(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        if self.expect_kind(TokenKind::Newline)?.is_some() {
            let next = self.peek()?.clone();
            if next.kind != TokenKind::Indent {
                return Err(self.raise_indentation_error("expected an indented block", &next));
            }
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_with_macro: 'with' '!' ','.with_item+ !':'
    ///
    /// Called just after the `!`.
    pub(crate) fn invalid_with_macro(&mut self) -> Result<(), ParseError> {
        let start = self.mark();
        if self.gathered(",", Self::with_item)?.is_some() {
            let next = self.peek()?.clone();
            if !next.is_exact_type(":") {
                return Err(self.raise_error_at("expected ':'", &next));
            }
        }
        self.reset(start);
        Ok(())
    }

    /// invalid_subproc: an opener directly followed by its closer.
    pub(crate) fn invalid_subproc(&mut self, open: &TokenInfo, closer: &str) -> Result<(), ParseError> {
        let next = self.peek()?.clone();
        if next.is_exact_type(closer) {
            let message = format!("empty subprocess literal '{}{}'", open.text, closer);
            return Err(self.raise_error_range(&message, open.start, next.end));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::error::{ErrorKind, SyntaxError};
    use crate::parser::runtime::ParserOptions;
    use crate::tokenizer::Tokenizer;

    fn error(source: &str) -> SyntaxError {
        let mut p = Parser::new(Tokenizer::from_str(source), ParserOptions::default());
        p.parse(Parser::file).unwrap_err()
    }

    #[test]
    fn test_cannot_assign() {
        let err = error("f() = 1\n");
        assert_eq!(err.message, "cannot assign to function call");
        assert_eq!((err.start.column, err.end.column), (0, 3));

        let err = error("a, 1 = x\n");
        assert_eq!(err.message, "cannot assign to literal");
        assert_eq!(err.start.column, 3);
    }

    #[test]
    fn test_augmented_assignment_target() {
        let err = error("a, b += 1\n");
        assert_eq!(err.message, "'tuple' is an illegal expression for augmented assignment");
    }

    #[test]
    fn test_walrus_target() {
        let err = error("(a.b := 1)\n");
        assert_eq!(err.message, "cannot use assignment expressions with attribute");
    }

    #[test]
    fn test_missing_else() {
        let err = error("x = a if b\n");
        assert_eq!(err.message, "expected 'else' after 'if' expression");
    }

    #[test]
    fn test_dict_key_without_value() {
        let err = error("d = {'a': 1, 'b':}\n");
        assert_eq!(err.message, "expression expected after dictionary key and ':'");
    }

    #[test]
    fn test_missing_indented_block() {
        let err = error("if x:\npass\n");
        assert_eq!(err.kind, ErrorKind::Indentation);
        assert_eq!(err.message, "expected an indented block");
        assert_eq!(err.start.line, 2);
    }

    #[test]
    fn test_empty_subprocess() {
        let err = error("x = $()\n");
        assert_eq!(err.message, "empty subprocess literal '$()'");
        assert_eq!((err.start.column, err.end.column), (4, 7));
    }

    #[test]
    fn test_with_macro_without_colon() {
        let err = error("with! x\n");
        assert_eq!(err.message, "expected ':'");
    }

    #[test]
    fn test_plain_invalid_syntax() {
        let err = error("x = = 1\n");
        assert_eq!(err.message, "invalid syntax");
        assert_eq!(err.start.column, 4);
    }
}
