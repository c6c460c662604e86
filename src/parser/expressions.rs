//! Expression rules
//!
//! Every rule is a `pub(crate)` method on [`Parser`] returning
//! `PResult<Expr>`: `Ok(None)` means the rule did not match and the stream
//! is back where it started.
//!
//! # Supported Expressions
//!
//! - Literals: numbers, strings, f-strings, `p"..."` paths, backtick searches
//! - Names, `$NAME` and `${expr}` environment lookups
//! - Boolean, comparison, bitwise and arithmetic operators
//! - Conditional expressions, `lambda`, `:=`, `await`, `yield`
//! - Displays and comprehensions for tuples, lists, sets and dicts
//! - Postfix: attribute access, calls, subscripts, `name!(...)` macro calls,
//!   `x?` and `x??` help
//! - Subprocess literals (see [`super::subproc`])
//!
//! # Precedence
//!
//! The binary operator levels are left-recursive rules grown by
//! [`Parser::memoize_left_rec`], so `a - b - c` comes out as `(a - b) - c`
//! without any precedence table.

use super::ast::*;
use super::error::ParseError;
use super::runtime::{PResult, Parser, Rule, RuleId};
use crate::tokenizer::token::is_keyword;
use crate::tokenizer::{Mark, TokenKind};

const STAR_EXPRESSION: RuleId = RuleId::new("star_expression");
const NAMED_EXPRESSION: RuleId = RuleId::new("named_expression");
const EXPRESSION: RuleId = RuleId::new("expression");
const DISJUNCTION: RuleId = RuleId::new("disjunction");
const CONJUNCTION: RuleId = RuleId::new("conjunction");
const INVERSION: RuleId = RuleId::new("inversion");
const BITWISE_OR: RuleId = RuleId::new("bitwise_or");
const BITWISE_XOR: RuleId = RuleId::new("bitwise_xor");
const BITWISE_AND: RuleId = RuleId::new("bitwise_and");
const SHIFT_EXPR: RuleId = RuleId::new("shift_expr");
const SUM: RuleId = RuleId::new("sum");
const TERM: RuleId = RuleId::new("term");
const FACTOR: RuleId = RuleId::new("factor");
const AWAIT_PRIMARY: RuleId = RuleId::new("await_primary");
const PRIMARY: RuleId = RuleId::new("primary");
const ATOM: RuleId = RuleId::new("atom");

const SUBPROC_OPENERS: [&str; 5] = ["$(", "$[", "![", "!(", "@$("];

impl Parser {
    /// Build a node spanning from `start` to the last consumed token.
    pub(crate) fn finish(&self, start: Mark, kind: ExprKind) -> Expr {
        Expr::new(kind, self.span_from(start))
    }

    // ----- comma lists ---------------------------------------------------

    /// star_expressions: star_expression (',' star_expression)* [',']
    pub(crate) fn star_expressions(&mut self) -> PResult<Expr> {
        self.comma_list(Self::star_expression)
    }

    /// star_named_expressions: ','.star_named_expression+ [',']
    pub(crate) fn star_named_expressions(&mut self) -> PResult<Expr> {
        self.comma_list(Self::star_named_expression)
    }

    /// expressions: expression (',' expression)* [',']
    pub(crate) fn expressions(&mut self) -> PResult<Expr> {
        self.comma_list(Self::expression)
    }

    /// One item stays itself; a comma anywhere makes a tuple.
    fn comma_list(&mut self, item: Rule<Expr>) -> PResult<Expr> {
        let start = self.mark();
        let Some(first) = item(self)? else {
            return Ok(None);
        };
        let mut items = vec![first];
        let mut tuple = false;
        while self.expect(",")?.is_some() {
            tuple = true;
            match item(self)? {
                Some(next) => items.push(next),
                None => break,
            }
        }
        if tuple {
            Ok(Some(self.finish(start, ExprKind::Tuple(items))))
        } else {
            Ok(items.pop())
        }
    }

    /// star_expression: '*' bitwise_or | expression
    pub(crate) fn star_expression(&mut self) -> PResult<Expr> {
        self.memoize(STAR_EXPRESSION, |p| p.starred_or(Self::expression))
    }

    /// star_named_expression: '*' bitwise_or | named_expression
    pub(crate) fn star_named_expression(&mut self) -> PResult<Expr> {
        self.starred_or(Self::named_expression)
    }

    fn starred_or(&mut self, plain: Rule<Expr>) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("*")?.is_some() {
            if let Some(value) = self.bitwise_or()? {
                return Ok(Some(self.finish(start, ExprKind::Starred(value.boxed()))));
            }
            self.reset(start);
            return Ok(None);
        }
        plain(self)
    }

    // ----- top level forms -----------------------------------------------

    /// named_expression: NAME ':=' ~ expression | expression !':='
    pub(crate) fn named_expression(&mut self) -> PResult<Expr> {
        self.memoize(NAMED_EXPRESSION, Self::named_expression_body)
    }

    fn named_expression_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if let Some(target) = self.name()? {
            if self.expect(":=")?.is_some() {
                let target = self.finish(start, ExprKind::Name(target.text));
                return match self.expression()? {
                    Some(value) => Ok(Some(self.finish(
                        start,
                        ExprKind::NamedExpr {
                            target: target.boxed(),
                            value: value.boxed(),
                        },
                    ))),
                    None => {
                        self.reset(start);
                        Ok(None)
                    }
                };
            }
            self.reset(start);
        }
        if self.call_invalid_rules() {
            self.invalid_named_expression()?;
        }
        let Some(expr) = self.expression()? else {
            return Ok(None);
        };
        if self.positive_lookahead(|p| p.expect(":="))? {
            self.reset(start);
            return Ok(None);
        }
        Ok(Some(expr))
    }

    /// expression:
    ///     | disjunction 'if' disjunction 'else' expression
    ///     | disjunction
    ///     | lambdef
    pub(crate) fn expression(&mut self) -> PResult<Expr> {
        self.memoize(EXPRESSION, Self::expression_body)
    }

    fn expression_body(&mut self) -> PResult<Expr> {
        if self.call_invalid_rules() {
            self.invalid_expression()?;
        }
        let start = self.mark();
        if let Some(body) = self.disjunction()? {
            let after_body = self.mark();
            if let Some((test, orelse)) = self.conditional_tail()? {
                return Ok(Some(self.finish(
                    start,
                    ExprKind::IfExp {
                        test: test.boxed(),
                        body: body.boxed(),
                        orelse: orelse.boxed(),
                    },
                )));
            }
            self.reset(after_body);
            return Ok(Some(body));
        }
        self.lambdef()
    }

    /// 'if' disjunction 'else' expression
    fn conditional_tail(&mut self) -> PResult<(Expr, Expr)> {
        let mark = self.mark();
        if self.expect("if")?.is_some() {
            if let Some(test) = self.disjunction()? {
                if self.expect("else")?.is_some() {
                    if let Some(orelse) = self.expression()? {
                        return Ok(Some((test, orelse)));
                    }
                }
            }
        }
        self.reset(mark);
        Ok(None)
    }

    /// yield_expr: 'yield' 'from' expression | 'yield' [star_expressions]
    pub(crate) fn yield_expr(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("yield")?.is_none() {
            return Ok(None);
        }
        if self.expect("from")?.is_some() {
            return match self.expression()? {
                Some(value) => Ok(Some(self.finish(start, ExprKind::YieldFrom(value.boxed())))),
                None => {
                    self.reset(start);
                    Ok(None)
                }
            };
        }
        let value = self.star_expressions()?.map(Expr::boxed);
        Ok(Some(self.finish(start, ExprKind::Yield(value))))
    }

    /// lambdef: 'lambda' [lambda_params] ':' expression
    fn lambdef(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("lambda")?.is_none() {
            return Ok(None);
        }
        if let Some(args) = self.parameters(false, ":")? {
            if self.expect(":")?.is_some() {
                if let Some(body) = self.expression()? {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::Lambda {
                            args: Box::new(args),
                            body: body.boxed(),
                        },
                    )));
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// Formal parameters up to (not including) `close`. Annotations are
    /// only accepted for `def`.
    pub(crate) fn parameters(&mut self, annotated: bool, close: &str) -> PResult<Arguments> {
        let start = self.mark();
        let mut args = Arguments::default();
        let mut after_star = false;
        loop {
            if self.positive_lookahead(|p| p.expect(close))? {
                break;
            }
            if self.expect("/")?.is_some() {
                // positional-only marker; nothing to record
            } else if self.expect("**")?.is_some() {
                match self.param(annotated)? {
                    Some(param) => args.kwarg = Some(param),
                    None => {
                        self.reset(start);
                        return Ok(None);
                    }
                }
            } else if self.expect("*")?.is_some() {
                args.vararg = self.param(annotated)?;
                after_star = true;
            } else {
                match self.param(annotated)? {
                    Some(param) if after_star => args.kwonly.push(param),
                    Some(param) => args.args.push(param),
                    None => {
                        self.reset(start);
                        return Ok(None);
                    }
                }
            }
            if self.expect(",")?.is_none() {
                break;
            }
        }
        Ok(Some(args))
    }

    /// param: NAME [':' expression] ['=' expression]
    fn param(&mut self, annotated: bool) -> PResult<Param> {
        let start = self.mark();
        let Some(name) = self.name()? else {
            return Ok(None);
        };
        let mut annotation = None;
        if annotated && self.expect(":")?.is_some() {
            annotation = self.expression()?;
            if annotation.is_none() {
                self.reset(start);
                return Ok(None);
            }
        }
        let mut default = None;
        if self.expect("=")?.is_some() {
            default = self.expression()?;
            if default.is_none() {
                self.reset(start);
                return Ok(None);
            }
        }
        Ok(Some(Param {
            name: name.text,
            annotation,
            default,
        }))
    }

    // ----- boolean and comparison ----------------------------------------

    /// disjunction: conjunction ('or' conjunction)+ | conjunction
    pub(crate) fn disjunction(&mut self) -> PResult<Expr> {
        self.memoize(DISJUNCTION, |p| p.bool_chain("or", BoolOp::Or, Self::conjunction))
    }

    /// conjunction: inversion ('and' inversion)+ | inversion
    fn conjunction(&mut self) -> PResult<Expr> {
        self.memoize(CONJUNCTION, |p| p.bool_chain("and", BoolOp::And, Self::inversion))
    }

    fn bool_chain(&mut self, keyword: &str, op: BoolOp, operand: Rule<Expr>) -> PResult<Expr> {
        let start = self.mark();
        let Some(first) = operand(self)? else {
            return Ok(None);
        };
        let mut values = vec![first];
        loop {
            let mark = self.mark();
            if self.expect(keyword)?.is_none() {
                break;
            }
            match operand(self)? {
                Some(value) => values.push(value),
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        if values.len() == 1 {
            return Ok(values.pop());
        }
        Ok(Some(self.finish(start, ExprKind::BoolOp { op, values })))
    }

    /// inversion: 'not' inversion | comparison
    fn inversion(&mut self) -> PResult<Expr> {
        self.memoize(INVERSION, Self::inversion_body)
    }

    fn inversion_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("not")?.is_some() {
            if let Some(operand) = self.inversion()? {
                return Ok(Some(self.finish(
                    start,
                    ExprKind::UnaryOp {
                        op: UnaryOp::Not,
                        operand: operand.boxed(),
                    },
                )));
            }
            self.reset(start);
            return Ok(None);
        }
        self.comparison()
    }

    /// comparison: bitwise_or (compare_op bitwise_or)*
    fn comparison(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let Some(left) = self.bitwise_or()? else {
            return Ok(None);
        };
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let mark = self.mark();
            let Some(op) = self.compare_op()? else {
                break;
            };
            match self.bitwise_or()? {
                Some(right) => {
                    ops.push(op);
                    comparators.push(right);
                }
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        if ops.is_empty() {
            return Ok(Some(left));
        }
        Ok(Some(self.finish(
            start,
            ExprKind::Compare {
                left: left.boxed(),
                ops,
                comparators,
            },
        )))
    }

    fn compare_op(&mut self) -> PResult<CmpOp> {
        const SIMPLE: [(&str, CmpOp); 7] = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::NotEq),
            ("<=", CmpOp::LtE),
            ("<", CmpOp::Lt),
            (">=", CmpOp::GtE),
            (">", CmpOp::Gt),
            ("in", CmpOp::In),
        ];
        for (symbol, op) in SIMPLE {
            if self.expect(symbol)?.is_some() {
                return Ok(Some(op));
            }
        }
        let mark = self.mark();
        if self.expect("not")?.is_some() {
            if self.expect("in")?.is_some() {
                return Ok(Some(CmpOp::NotIn));
            }
            self.reset(mark);
            return Ok(None);
        }
        if self.expect("is")?.is_some() {
            if self.expect("not")?.is_some() {
                return Ok(Some(CmpOp::IsNot));
            }
            return Ok(Some(CmpOp::Is));
        }
        Ok(None)
    }

    // ----- binary operators ----------------------------------------------

    /// bitwise_or: bitwise_or '|' bitwise_xor | bitwise_xor
    pub(crate) fn bitwise_or(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(BITWISE_OR, |p| p.binary(&["|"], Self::bitwise_or, Self::bitwise_xor))
    }

    fn bitwise_xor(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(BITWISE_XOR, |p| p.binary(&["^"], Self::bitwise_xor, Self::bitwise_and))
    }

    fn bitwise_and(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(BITWISE_AND, |p| p.binary(&["&"], Self::bitwise_and, Self::shift_expr))
    }

    fn shift_expr(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(SHIFT_EXPR, |p| p.binary(&["<<", ">>"], Self::shift_expr, Self::sum))
    }

    fn sum(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(SUM, |p| p.binary(&["+", "-"], Self::sum, Self::term))
    }

    fn term(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(TERM, |p| {
            p.binary(&["*", "/", "//", "%", "@"], Self::term, Self::factor)
        })
    }

    /// this: this OP operand | operand
    ///
    /// `this` is the rule being grown; inside the growing loop it answers
    /// from the memo with the previous, shorter match.
    fn binary(&mut self, ops: &[&str], this: Rule<Expr>, operand: Rule<Expr>) -> PResult<Expr> {
        let start = self.mark();
        if let Some(left) = this(self)? {
            let after_left = self.mark();
            for symbol in ops {
                let Some(op) = BinOp::from_symbol(symbol) else {
                    continue;
                };
                if self.expect(symbol)?.is_some() {
                    if let Some(right) = operand(self)? {
                        return Ok(Some(self.finish(
                            start,
                            ExprKind::BinOp {
                                left: left.boxed(),
                                op,
                                right: right.boxed(),
                            },
                        )));
                    }
                }
                self.reset(after_left);
            }
        }
        self.reset(start);
        operand(self)
    }

    /// factor: '+' factor | '-' factor | '~' factor | power
    fn factor(&mut self) -> PResult<Expr> {
        self.memoize(FACTOR, Self::factor_body)
    }

    fn factor_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        for (symbol, op) in [("+", UnaryOp::UAdd), ("-", UnaryOp::USub), ("~", UnaryOp::Invert)] {
            if self.expect(symbol)?.is_some() {
                if let Some(operand) = self.factor()? {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::UnaryOp {
                            op,
                            operand: operand.boxed(),
                        },
                    )));
                }
                self.reset(start);
                return Ok(None);
            }
        }
        self.power()
    }

    /// power: await_primary '**' factor | await_primary
    fn power(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let Some(base) = self.await_primary()? else {
            return Ok(None);
        };
        let after_base = self.mark();
        if self.expect("**")?.is_some() {
            if let Some(exponent) = self.factor()? {
                return Ok(Some(self.finish(
                    start,
                    ExprKind::BinOp {
                        left: base.boxed(),
                        op: BinOp::Pow,
                        right: exponent.boxed(),
                    },
                )));
            }
            self.reset(after_base);
        }
        Ok(Some(base))
    }

    /// await_primary: 'await' primary | primary
    fn await_primary(&mut self) -> PResult<Expr> {
        self.memoize(AWAIT_PRIMARY, |p| {
            let start = p.mark();
            if p.expect("await")?.is_some() {
                return match p.primary()? {
                    Some(value) => Ok(Some(p.finish(start, ExprKind::Await(value.boxed())))),
                    None => {
                        p.reset(start);
                        Ok(None)
                    }
                };
            }
            p.primary()
        })
    }

    // ----- primary -------------------------------------------------------

    /// primary:
    ///     | primary '.' NAME
    ///     | primary genexp
    ///     | primary '(' [arguments] ')'
    ///     | primary '[' slices ']'
    ///     | primary '!(' MACRO_PARAM* ')'
    ///     | primary '??' | primary '?'
    ///     | atom
    pub(crate) fn primary(&mut self) -> PResult<Expr> {
        self.memoize_left_rec(PRIMARY, Self::primary_body)
    }

    fn primary_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if let Some(value) = self.primary()? {
            let after_value = self.mark();
            if let Some(extended) = self.nested(|p| p.primary_trailer(start, value))? {
                return Ok(Some(extended));
            }
            self.reset(after_value);
        }
        self.reset(start);
        self.atom()
    }

    fn primary_trailer(&mut self, start: Mark, value: Expr) -> PResult<Expr> {
        let mark = self.mark();

        if self.expect(".")?.is_some() {
            if let Some(attr) = self.name()? {
                return Ok(Some(self.finish(
                    start,
                    ExprKind::Attribute {
                        value: value.boxed(),
                        attr: attr.text,
                    },
                )));
            }
            self.reset(mark);
            return Ok(None);
        }

        if let Some(genexp) = self.genexp()? {
            return Ok(Some(self.finish(
                start,
                ExprKind::Call {
                    func: value.boxed(),
                    args: vec![genexp],
                    keywords: Vec::new(),
                },
            )));
        }

        if self.expect("(")?.is_some() {
            if let Some((args, keywords)) = self.call_arguments()? {
                if self.expect(")")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::Call {
                            func: value.boxed(),
                            args,
                            keywords,
                        },
                    )));
                }
            }
            self.reset(mark);
            return Ok(None);
        }

        if self.expect("[")?.is_some() {
            if let Some(slice) = self.slices()? {
                if self.expect("]")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::Subscript {
                            value: value.boxed(),
                            slice: slice.boxed(),
                        },
                    )));
                }
            }
            self.reset(mark);
            return Ok(None);
        }

        if let Some(open) = self.expect("!(")? {
            if open.start == value.span.end {
                let mut args = Vec::new();
                while let Some(param) = self.expect_kind(TokenKind::MacroParam)? {
                    args.push(param.text);
                }
                if self.expect(")")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::MacroCall {
                            func: value.boxed(),
                            args,
                        },
                    )));
                }
            }
            self.reset(mark);
            return Ok(None);
        }

        for (symbol, superhelp) in [("??", true), ("?", false)] {
            if self.expect(symbol)?.is_some() {
                return Ok(Some(self.finish(
                    start,
                    ExprKind::Help {
                        target: value.boxed(),
                        superhelp,
                    },
                )));
            }
        }
        Ok(None)
    }

    /// arguments: ','.('*' expression | '**' expression | NAME '=' expression | named_expression)+ [',']
    pub(crate) fn call_arguments(&mut self) -> PResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        loop {
            if self.positive_lookahead(|p| p.expect(")"))? {
                break;
            }
            let start = self.mark();
            if self.expect("*")?.is_some() {
                let Some(value) = self.expression()? else {
                    return Ok(None);
                };
                args.push(self.finish(start, ExprKind::Starred(value.boxed())));
            } else if self.expect("**")?.is_some() {
                let Some(value) = self.expression()? else {
                    return Ok(None);
                };
                keywords.push(Keyword { arg: None, value });
            } else if let Some(keyword) = self.keyword_argument()? {
                keywords.push(keyword);
            } else if let Some(value) = self.named_expression()? {
                args.push(value);
            } else {
                return Ok(None);
            }
            if self.expect(",")?.is_none() {
                break;
            }
        }
        Ok(Some((args, keywords)))
    }

    /// NAME '=' expression
    fn keyword_argument(&mut self) -> PResult<Keyword> {
        let start = self.mark();
        if let Some(name) = self.name()? {
            if self.expect("=")?.is_some() {
                if let Some(value) = self.expression()? {
                    return Ok(Some(Keyword {
                        arg: Some(name.text),
                        value,
                    }));
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// slices: slice !',' | ','.(slice | starred_expression)+ [',']
    fn slices(&mut self) -> PResult<Expr> {
        self.comma_list(Self::slice)
    }

    /// slice: [expression] ':' [expression] [':' [expression]] | star_named_expression
    fn slice(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let lower = self.expression()?;
        if self.expect(":")?.is_some() {
            let upper = self.expression()?;
            let step = match self.expect(":")? {
                Some(_) => self.expression()?,
                None => None,
            };
            return Ok(Some(self.finish(
                start,
                ExprKind::Slice {
                    lower: lower.map(Expr::boxed),
                    upper: upper.map(Expr::boxed),
                    step: step.map(Expr::boxed),
                },
            )));
        }
        self.reset(start);
        self.star_named_expression()
    }

    // ----- atoms ---------------------------------------------------------

    /// atom:
    ///     | NAME | 'True' | 'False' | 'None' | '...'
    ///     | strings | NUMBER | SEARCH_PATH
    ///     | tuple | group | genexp | list | listcomp | dict | set | dictcomp | setcomp
    ///     | '$' NAME | '${' expression '}'
    ///     | sub_procs
    pub(crate) fn atom(&mut self) -> PResult<Expr> {
        self.memoize(ATOM, Self::atom_body)
    }

    fn atom_body(&mut self) -> PResult<Expr> {
        let start = self.mark();
        let tok = self.peek()?.clone();
        match tok.kind {
            TokenKind::Name => {
                let constant = match tok.text.as_str() {
                    "True" => Some(Constant::True),
                    "False" => Some(Constant::False),
                    "None" => Some(Constant::None),
                    text if is_keyword(text) => return Ok(None),
                    _ => None,
                };
                self.advance()?;
                let kind = match constant {
                    Some(constant) => ExprKind::Constant(constant),
                    None => ExprKind::Name(tok.text),
                };
                Ok(Some(self.finish(start, kind)))
            }
            TokenKind::Number => {
                self.advance()?;
                Ok(Some(self.finish(
                    start,
                    ExprKind::Constant(Constant::Number(tok.text)),
                )))
            }
            TokenKind::String | TokenKind::FStringStart => self.strings(),
            TokenKind::SearchPath => self.search_path(),
            TokenKind::Op => match tok.text.as_str() {
                "(" => self.nested(Self::tuple_group_or_genexp),
                "[" => self.nested(Self::list_or_listcomp),
                "{" => self.nested(Self::dict_or_set),
                "..." => {
                    self.advance()?;
                    Ok(Some(self.finish(start, ExprKind::Constant(Constant::Ellipsis))))
                }
                "$" | "${" => self.nested(Self::env_atom),
                opener if SUBPROC_OPENERS.contains(&opener) => self.nested(Self::sub_procs),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// '$' NAME | '${' expression '}'
    pub(crate) fn env_atom(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if let Some(dollar) = self.expect("$")? {
            if let Some(name) = self.expect_kind(TokenKind::Name)? {
                if name.is_next_to(&dollar) {
                    return Ok(Some(self.finish(start, ExprKind::Env(name.text))));
                }
            }
        } else if self.expect("${")?.is_some() {
            if let Some(value) = self.expression()? {
                if self.expect("}")?.is_some() {
                    return Ok(Some(self.finish(start, ExprKind::EnvExpr(value.boxed()))));
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// '(' ')' | '(' yield_expr ')' | genexp
    /// | '(' star_named_expression ',' [star_named_expressions] ')'
    /// | '(' named_expression ')'
    fn tuple_group_or_genexp(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("(")?.is_none() {
            return Ok(None);
        }
        if self.expect(")")?.is_some() {
            return Ok(Some(self.finish(start, ExprKind::Tuple(Vec::new()))));
        }
        let inner_start = self.mark();
        if let Some(value) = self.yield_expr()? {
            if self.expect(")")?.is_some() {
                return Ok(Some(value));
            }
        }
        self.reset(start);
        if let Some(genexp) = self.genexp()? {
            return Ok(Some(genexp));
        }
        self.reset(inner_start);
        if let Some(inner) = self.star_named_expressions()? {
            if self.expect(")")?.is_some() {
                return Ok(Some(match inner.kind {
                    ExprKind::Tuple(items) => self.finish(start, ExprKind::Tuple(items)),
                    kind => Expr::new(kind, inner.span),
                }));
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// genexp: '(' named_expression for_if_clauses ')'
    fn genexp(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("(")?.is_some() {
            if let Some(elt) = self.named_expression()? {
                if let Some(generators) = self.for_if_clauses()? {
                    if self.expect(")")?.is_some() {
                        return Ok(Some(self.finish(
                            start,
                            ExprKind::GeneratorExp {
                                elt: elt.boxed(),
                                generators,
                            },
                        )));
                    }
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// '[' named_expression for_if_clauses ']' | '[' [star_named_expressions] ']'
    fn list_or_listcomp(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("[")?.is_none() {
            return Ok(None);
        }
        let inner_start = self.mark();
        if let Some(elt) = self.named_expression()? {
            if let Some(generators) = self.for_if_clauses()? {
                if self.expect("]")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::ListComp {
                            elt: elt.boxed(),
                            generators,
                        },
                    )));
                }
            }
        }
        self.reset(inner_start);
        let items = self.display_items(Self::star_named_expression)?;
        if self.expect("]")?.is_some() {
            return Ok(Some(self.finish(start, ExprKind::List(items))));
        }
        self.reset(start);
        Ok(None)
    }

    /// `','.item* [',']` as a plain vector.
    fn display_items(&mut self, item: Rule<Expr>) -> Result<Vec<Expr>, ParseError> {
        let items = self.gathered(",", item)?.unwrap_or_default();
        if !items.is_empty() {
            self.expect(",")?;
        }
        Ok(items)
    }

    /// '{' '}' | dictcomp | setcomp | dict | set
    fn dict_or_set(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("{")?.is_none() {
            return Ok(None);
        }
        if self.expect("}")?.is_some() {
            return Ok(Some(self.finish(
                start,
                ExprKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
            )));
        }
        let inner_start = self.mark();

        if let Some((key, value)) = self.kvpair()? {
            if let Some(generators) = self.for_if_clauses()? {
                if self.expect("}")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::DictComp {
                            key: key.boxed(),
                            value: value.boxed(),
                            generators,
                        },
                    )));
                }
            }
        }
        self.reset(inner_start);

        if let Some(elt) = self.named_expression()? {
            if let Some(generators) = self.for_if_clauses()? {
                if self.expect("}")?.is_some() {
                    return Ok(Some(self.finish(
                        start,
                        ExprKind::SetComp {
                            elt: elt.boxed(),
                            generators,
                        },
                    )));
                }
            }
        }
        self.reset(inner_start);

        if let Some(pairs) = self.gathered(",", Self::double_starred_kvpair)? {
            self.expect(",")?;
            if self.expect("}")?.is_some() {
                let (keys, values) = pairs.into_iter().unzip();
                return Ok(Some(self.finish(start, ExprKind::Dict { keys, values })));
            }
        }
        self.reset(inner_start);
        if self.call_invalid_rules() {
            self.invalid_double_starred()?;
        }

        let items = self.display_items(Self::star_named_expression)?;
        if !items.is_empty() && self.expect("}")?.is_some() {
            return Ok(Some(self.finish(start, ExprKind::Set(items))));
        }
        self.reset(start);
        Ok(None)
    }

    /// kvpair: expression ':' expression
    pub(crate) fn kvpair(&mut self) -> PResult<(Expr, Expr)> {
        let start = self.mark();
        if let Some(key) = self.expression()? {
            if self.expect(":")?.is_some() {
                if let Some(value) = self.expression()? {
                    return Ok(Some((key, value)));
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// double_starred_kvpair: '**' bitwise_or | kvpair
    pub(crate) fn double_starred_kvpair(&mut self) -> PResult<(Option<Expr>, Expr)> {
        let start = self.mark();
        if self.expect("**")?.is_some() {
            if let Some(mapping) = self.bitwise_or()? {
                return Ok(Some((None, mapping)));
            }
            self.reset(start);
            return Ok(None);
        }
        Ok(self.kvpair()?.map(|(key, value)| (Some(key), value)))
    }

    // ----- comprehensions and targets ------------------------------------

    /// for_if_clauses: (['async'] 'for' star_targets 'in' ~ disjunction ('if' disjunction)*)+
    fn for_if_clauses(&mut self) -> PResult<Vec<Comprehension>> {
        self.repeated1(Self::for_if_clause)
    }

    fn for_if_clause(&mut self) -> PResult<Comprehension> {
        let start = self.mark();
        let is_async = self.expect("async")?.is_some();
        if self.expect("for")?.is_some() {
            if let Some(target) = self.star_targets()? {
                if self.expect("in")?.is_some() {
                    if let Some(iter) = self.disjunction()? {
                        let ifs = self.repeated(|p| {
                            if p.expect("if")?.is_none() {
                                return Ok(None);
                            }
                            p.disjunction()
                        })?;
                        return Ok(Some(Comprehension {
                            target,
                            iter,
                            ifs,
                            is_async,
                        }));
                    }
                }
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// star_targets: star_target (',' star_target)* [',']
    ///
    /// Targets are parsed as `bitwise_or` expressions, which stops before
    /// `in`, `=` and comparison operators, and are then checked for
    /// assignability.
    pub(crate) fn star_targets(&mut self) -> PResult<Expr> {
        self.comma_list(Self::star_target)
    }

    /// star_target: '*' star_target | bitwise_or (assignable)
    pub(crate) fn star_target(&mut self) -> PResult<Expr> {
        let start = self.mark();
        if self.expect("*")?.is_some() {
            if let Some(inner) = self.star_target()? {
                return Ok(Some(self.finish(start, ExprKind::Starred(inner.boxed()))));
            }
            self.reset(start);
            return Ok(None);
        }
        match self.bitwise_or()? {
            Some(target) if target.kind.is_assignable() => Ok(Some(target)),
            _ => {
                self.reset(start);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::runtime::Parser;

    fn eval(source: &str) -> Expr {
        let mut p = Parser::from_str(source);
        let expr = p.star_expressions().unwrap().expect("expression should parse");
        assert!(p.peek().unwrap().kind == TokenKind::Newline || p.peek().unwrap().kind == TokenKind::EndMarker);
        expr
    }

    fn render(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Name(name) => name.clone(),
            ExprKind::Constant(Constant::Number(n)) => n.clone(),
            ExprKind::BinOp { left, op, right } => {
                format!("({} {:?} {})", render(left), op, render(right))
            }
            ExprKind::UnaryOp { op, operand } => format!("({:?} {})", op, render(operand)),
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn test_binary_operators_associate_left() {
        assert_eq!(render(&eval("a - b - c")), "((a Sub b) Sub c)");
        assert_eq!(render(&eval("a + b * c")), "(a Add (b Mult c))");
        assert_eq!(render(&eval("-a ** 2")), "(USub (a Pow 2))");
        assert_eq!(render(&eval("a | b & c << 1")), "(a BitOr (b BitAnd (c LShift 1)))");
    }

    #[test]
    fn test_comparison_chain() {
        let expr = eval("a < b <= c not in d is not e");
        let ExprKind::Compare { ops, comparators, .. } = expr.kind else {
            panic!("expected a comparison");
        };
        assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE, CmpOp::NotIn, CmpOp::IsNot]);
        assert_eq!(comparators.len(), 4);
    }

    #[test]
    fn test_bool_ops_and_conditional() {
        let expr = eval("x if a or b and not c else y");
        let ExprKind::IfExp { test, .. } = expr.kind else {
            panic!("expected a conditional");
        };
        assert!(matches!(test.kind, ExprKind::BoolOp { op: BoolOp::Or, ref values } if values.len() == 2));
    }

    #[test]
    fn test_calls_attributes_and_subscripts() {
        let expr = eval("obj.method(1, *rest, key=2, **extra)[1:2, ::3]");
        let ExprKind::Subscript { value, slice } = expr.kind else {
            panic!("expected a subscript");
        };
        assert!(matches!(slice.kind, ExprKind::Tuple(ref items) if items.len() == 2));
        let ExprKind::Call { func, args, keywords } = value.kind else {
            panic!("expected a call");
        };
        assert!(matches!(func.kind, ExprKind::Attribute { ref attr, .. } if attr == "method"));
        assert_eq!(args.len(), 2);
        assert_eq!(keywords.len(), 2);
        assert!(keywords[1].arg.is_none());
    }

    #[test]
    fn test_displays_and_comprehensions() {
        assert!(matches!(eval("()").kind, ExprKind::Tuple(ref items) if items.is_empty()));
        assert!(matches!(eval("(1,)").kind, ExprKind::Tuple(ref items) if items.len() == 1));
        assert!(matches!(eval("(a)").kind, ExprKind::Name(_)));
        assert!(matches!(eval("[1, 2,]").kind, ExprKind::List(ref items) if items.len() == 2));
        assert!(matches!(eval("{}").kind, ExprKind::Dict { .. }));
        assert!(matches!(eval("{1, 2}").kind, ExprKind::Set(_)));
        assert!(matches!(eval("{'a': 1, **b}").kind, ExprKind::Dict { ref keys, .. } if keys[1].is_none()));
        assert!(matches!(eval("[x for x in y if x]").kind, ExprKind::ListComp { ref generators, .. } if generators[0].ifs.len() == 1));
        assert!(matches!(eval("{k: v for k, v in items}").kind, ExprKind::DictComp { .. }));
        assert!(matches!(eval("f(x for x in y)").kind, ExprKind::Call { ref args, .. } if matches!(args[0].kind, ExprKind::GeneratorExp { .. })));
    }

    #[test]
    fn test_lambda_and_walrus() {
        let ExprKind::Lambda { args, .. } = eval("lambda a, b=1, *c, d, **e: a").kind else {
            panic!("expected a lambda");
        };
        assert_eq!(args.args.len(), 2);
        assert!(args.vararg.is_some());
        assert_eq!(args.kwonly.len(), 1);
        assert!(args.kwarg.is_some());

        let mut p = Parser::from_str("(n := 10)");
        let expr = p.atom().unwrap().unwrap();
        assert!(matches!(expr.kind, ExprKind::NamedExpr { .. }));
    }

    #[test]
    fn test_env_and_help() {
        assert!(matches!(eval("$HOME").kind, ExprKind::Env(ref name) if name == "HOME"));
        assert!(matches!(eval("${'HO' + 'ME'}").kind, ExprKind::EnvExpr(_)));
        assert!(matches!(eval("x.y??").kind, ExprKind::Help { superhelp: true, .. }));
        assert!(matches!(eval("x?").kind, ExprKind::Help { superhelp: false, .. }));
    }

    #[test]
    fn test_spans_cover_the_expression() {
        let expr = eval("foo(1) + 2");
        assert_eq!(expr.span.start.column, 0);
        assert_eq!(expr.span.end.column, 10);
    }
}
