//! Statement rules
//!
//! - Simple statements: expressions, assignments, `return`, `import`,
//!   `raise`, `pass`, `del`, `yield`, `assert`, `break`, `continue`,
//!   `global`, `nonlocal`
//! - Compound statements: `if`, `while`, `for`, `with`, `try`, `def`,
//!   `class`, decorators and their `async` forms
//! - `with! ctx:` blocks whose body the lexer captured as raw text
//!
//! # Grammar
//!
//! ```text
//! file       ::= [statements] ENDMARKER
//! statements ::= statement+
//! statement  ::= compound_stmt | simple_stmts
//! block      ::= NEWLINE INDENT statements DEDENT | simple_stmts
//! ```

use super::ast::*;
use super::error::ParseError;
use super::runtime::{PResult, Parser, RuleId};
use crate::tokenizer::{Mark, TokenKind};

const STATEMENTS: RuleId = RuleId::new("statements");
const SIMPLE_STMT: RuleId = RuleId::new("simple_stmt");
const BLOCK: RuleId = RuleId::new("block");

const AUGASSIGN: [&str; 13] = [
    "+=", "-=", "*=", "@=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "**=", "//=",
];

impl Parser {
    fn finish_stmt(&self, start: Mark, kind: StmtKind) -> Stmt {
        Stmt::new(kind, self.span_from(start))
    }

    /// file: [statements] ENDMARKER
    pub(crate) fn file(&mut self) -> PResult<Module> {
        let body = self.statements()?.unwrap_or_default();
        if self.expect_kind(TokenKind::EndMarker)?.is_none() {
            return Ok(None);
        }
        Ok(Some(Module { body }))
    }

    /// eval: expressions NEWLINE* ENDMARKER
    pub(crate) fn eval(&mut self) -> PResult<Expr> {
        let Some(expr) = self.expressions()? else {
            return Ok(None);
        };
        while self.expect_kind(TokenKind::Newline)?.is_some() {}
        if self.expect_kind(TokenKind::EndMarker)?.is_none() {
            return Ok(None);
        }
        Ok(Some(expr))
    }

    /// statements: statement+
    pub(crate) fn statements(&mut self) -> PResult<Vec<Stmt>> {
        self.memoize(STATEMENTS, |p| {
            Ok(p.repeated1(Self::statement)?.map(|groups| groups.concat()))
        })
    }

    /// statement: compound_stmt | simple_stmts
    fn statement(&mut self) -> PResult<Vec<Stmt>> {
        if let Some(stmt) = self.compound_stmt()? {
            return Ok(Some(vec![stmt]));
        }
        self.simple_stmts()
    }

    /// simple_stmts: ';'.simple_stmt+ [';'] NEWLINE
    fn simple_stmts(&mut self) -> PResult<Vec<Stmt>> {
        let start = self.mark();
        let Some(stmts) = self.gathered(";", Self::simple_stmt)? else {
            return Ok(None);
        };
        self.expect(";")?;
        if self.expect_kind(TokenKind::Newline)?.is_none() {
            self.reset(start);
            return Ok(None);
        }
        Ok(Some(stmts))
    }

    fn simple_stmt(&mut self) -> PResult<Stmt> {
        self.memoize(SIMPLE_STMT, Self::simple_stmt_body)
    }

    fn simple_stmt_body(&mut self) -> PResult<Stmt> {
        let start = self.mark();
        if self.call_invalid_rules() {
            self.invalid_assignment()?;
        }
        if let Some(stmt) = self.assignment()? {
            return Ok(Some(stmt));
        }
        if let Some(value) = self.star_expressions()? {
            return Ok(Some(self.finish_stmt(start, StmtKind::Expr(value))));
        }

        let keyword = self.peek()?.clone();
        if keyword.kind != TokenKind::Name {
            return Ok(None);
        }
        let kind = match keyword.text.as_str() {
            "pass" | "break" | "continue" => {
                self.advance()?;
                Some(match keyword.text.as_str() {
                    "pass" => StmtKind::Pass,
                    "break" => StmtKind::Break,
                    _ => StmtKind::Continue,
                })
            }
            "return" => {
                self.advance()?;
                Some(StmtKind::Return(self.star_expressions()?))
            }
            "yield" => self.yield_expr()?.map(StmtKind::Expr),
            "import" => self.import_name()?,
            "from" => self.import_from()?,
            "raise" => self.raise_stmt()?,
            "del" => self.del_stmt()?,
            "assert" => self.assert_stmt()?,
            "global" | "nonlocal" => self.scope_stmt()?,
            _ => None,
        };
        match kind {
            Some(kind) => Ok(Some(self.finish_stmt(start, kind))),
            None => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    // ----- assignment ----------------------------------------------------

    /// assignment:
    ///     | single_target ':' expression ['=' annotated_rhs]
    ///     | (star_targets '=')+ annotated_rhs !'='
    ///     | single_target augassign ~ annotated_rhs
    fn assignment(&mut self) -> PResult<Stmt> {
        let start = self.mark();

        if let Some(target) = self.single_target()? {
            if self.expect(":")?.is_some() {
                if let Some(annotation) = self.expression()? {
                    let after_annotation = self.mark();
                    let mut value = None;
                    if self.expect("=")?.is_some() {
                        value = self.annotated_rhs()?;
                        if value.is_none() {
                            self.reset(after_annotation);
                        }
                    }
                    return Ok(Some(self.finish_stmt(
                        start,
                        StmtKind::AnnAssign {
                            target,
                            annotation,
                            value,
                        },
                    )));
                }
            }
            self.reset(start);
        }

        let mut targets = Vec::new();
        loop {
            let mark = self.mark();
            match self.star_targets()? {
                Some(target) if self.expect("=")?.is_some() => targets.push(target),
                _ => {
                    self.reset(mark);
                    break;
                }
            }
        }
        if !targets.is_empty() {
            if let Some(value) = self.annotated_rhs()? {
                if self.negative_lookahead(|p| p.expect("="))? {
                    return Ok(Some(self.finish_stmt(start, StmtKind::Assign { targets, value })));
                }
            }
            self.reset(start);
        }

        if let Some(target) = self.single_target()? {
            if let Some(op) = self.augassign()? {
                return match self.annotated_rhs()? {
                    Some(value) => Ok(Some(self.finish_stmt(
                        start,
                        StmtKind::AugAssign { target, op, value },
                    ))),
                    None => {
                        self.reset(start);
                        Ok(None)
                    }
                };
            }
        }
        self.reset(start);
        Ok(None)
    }

    /// annotated_rhs: yield_expr | star_expressions
    fn annotated_rhs(&mut self) -> PResult<Expr> {
        match self.yield_expr()? {
            Some(value) => Ok(Some(value)),
            None => self.star_expressions(),
        }
    }

    /// A single name, attribute, subscript or environment variable.
    pub(crate) fn single_target(&mut self) -> PResult<Expr> {
        let start = self.mark();
        match self.bitwise_or()? {
            Some(target)
                if matches!(
                    target.kind,
                    ExprKind::Name(_)
                        | ExprKind::Attribute { .. }
                        | ExprKind::Subscript { .. }
                        | ExprKind::Env(_)
                        | ExprKind::EnvExpr(_)
                ) =>
            {
                Ok(Some(target))
            }
            _ => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    pub(crate) fn augassign(&mut self) -> PResult<BinOp> {
        let tok = self.peek()?;
        if tok.kind != TokenKind::Op || !AUGASSIGN.contains(&tok.text.as_str()) {
            return Ok(None);
        }
        let tok = self.advance()?;
        Ok(BinOp::from_symbol(tok.text.trim_end_matches('=')))
    }

    // ----- simple statements ---------------------------------------------

    /// import_name: 'import' ','.dotted_as_name+
    fn import_name(&mut self) -> PResult<StmtKind> {
        self.expect("import")?;
        Ok(self
            .gathered(",", |p| p.alias(Self::dotted_name))?
            .map(StmtKind::Import))
    }

    /// import_from:
    ///     | 'from' ('.' | '...')* dotted_name 'import' import_from_targets
    ///     | 'from' ('.' | '...')+ 'import' import_from_targets
    fn import_from(&mut self) -> PResult<StmtKind> {
        self.expect("from")?;
        let mut level = 0;
        loop {
            if self.expect(".")?.is_some() {
                level += 1;
            } else if self.expect("...")?.is_some() {
                level += 3;
            } else {
                break;
            }
        }
        let module = self.dotted_name()?;
        if module.is_none() && level == 0 {
            return Ok(None);
        }
        if self.expect("import")?.is_none() {
            return Ok(None);
        }
        let Some(names) = self.import_from_targets()? else {
            return Ok(None);
        };
        Ok(Some(StmtKind::ImportFrom {
            module,
            names,
            level,
        }))
    }

    /// '(' ','.import_from_as_name+ [','] ')' | ','.import_from_as_name+ !',' | '*'
    fn import_from_targets(&mut self) -> PResult<Vec<Alias>> {
        if self.expect("*")?.is_some() {
            return Ok(Some(vec![Alias {
                name: "*".to_string(),
                asname: None,
            }]));
        }
        let start = self.mark();
        let parenthesized = self.expect("(")?.is_some();
        let Some(names) = self.gathered(",", |p| p.alias(|p| Ok(p.name()?.map(|t| t.text))))? else {
            self.reset(start);
            return Ok(None);
        };
        if parenthesized {
            self.expect(",")?;
            if self.expect(")")?.is_none() {
                self.reset(start);
                return Ok(None);
            }
        } else if self.positive_lookahead(|p| p.expect(","))? {
            self.reset(start);
            return Ok(None);
        }
        Ok(Some(names))
    }

    /// name ['as' NAME]
    fn alias(&mut self, name: fn(&mut Parser) -> PResult<String>) -> PResult<Alias> {
        let start = self.mark();
        let Some(name) = name(self)? else {
            return Ok(None);
        };
        let mut asname = None;
        if self.expect("as")?.is_some() {
            match self.name()? {
                Some(tok) => asname = Some(tok.text),
                None => {
                    self.reset(start);
                    return Ok(None);
                }
            }
        }
        Ok(Some(Alias { name, asname }))
    }

    /// dotted_name: NAME ('.' NAME)*
    fn dotted_name(&mut self) -> PResult<String> {
        Ok(self
            .gathered(".", |p| Ok(p.name()?.map(|t| t.text)))?
            .map(|parts| parts.join(".")))
    }

    /// raise_stmt: 'raise' expression ['from' expression] | 'raise'
    fn raise_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("raise")?;
        let exc = self.expression()?;
        let mut cause = None;
        if exc.is_some() {
            let mark = self.mark();
            if self.expect("from")?.is_some() {
                cause = self.expression()?;
                if cause.is_none() {
                    self.reset(mark);
                }
            }
        }
        Ok(Some(StmtKind::Raise { exc, cause }))
    }

    /// del_stmt: 'del' ','.del_target+ [','] &(';' | NEWLINE)
    fn del_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("del")?;
        let Some(targets) = self.gathered(",", Self::del_target)? else {
            return Ok(None);
        };
        self.expect(",")?;
        let at_end = self.peek()?.kind == TokenKind::Newline || self.peek()?.is_exact_type(";");
        Ok(at_end.then_some(StmtKind::Delete(targets)))
    }

    fn del_target(&mut self) -> PResult<Expr> {
        let start = self.mark();
        match self.bitwise_or()? {
            Some(target)
                if target.kind.is_assignable() && !matches!(target.kind, ExprKind::Starred(_)) =>
            {
                Ok(Some(target))
            }
            _ => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    /// assert_stmt: 'assert' expression [',' expression]
    fn assert_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("assert")?;
        let Some(test) = self.expression()? else {
            return Ok(None);
        };
        let mut msg = None;
        let mark = self.mark();
        if self.expect(",")?.is_some() {
            msg = self.expression()?;
            if msg.is_none() {
                self.reset(mark);
            }
        }
        Ok(Some(StmtKind::Assert { test, msg }))
    }

    /// ('global' | 'nonlocal') ','.NAME+
    fn scope_stmt(&mut self) -> PResult<StmtKind> {
        let keyword = self.advance()?;
        let Some(names) = self.gathered(",", |p| Ok(p.name()?.map(|t| t.text)))? else {
            return Ok(None);
        };
        Ok(Some(if keyword.text == "global" {
            StmtKind::Global(names)
        } else {
            StmtKind::Nonlocal(names)
        }))
    }

    // ----- compound statements -------------------------------------------

    fn compound_stmt(&mut self) -> PResult<Stmt> {
        let tok = self.peek()?.clone();
        let start = self.mark();
        let kind = match (tok.kind, tok.text.as_str()) {
            (TokenKind::Op, "@") => self.decorated()?,
            (TokenKind::Name, "def") => self.function_def(Vec::new(), false)?,
            (TokenKind::Name, "class") => self.class_def(Vec::new())?,
            (TokenKind::Name, "if") => self.if_stmt("if")?,
            (TokenKind::Name, "while") => self.while_stmt()?,
            (TokenKind::Name, "for") => self.for_stmt(false)?,
            (TokenKind::Name, "with") => self.with_stmt(false)?,
            (TokenKind::Name, "try") => self.try_stmt()?,
            (TokenKind::Name, "async") => self.async_stmt()?,
            _ => return Ok(None),
        };
        match kind {
            Some(kind) => Ok(Some(self.finish_stmt(start, kind))),
            None => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    /// block: NEWLINE INDENT statements DEDENT | simple_stmts | invalid_block
    pub(crate) fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.memoize(BLOCK, Self::block_body)
    }

    fn block_body(&mut self) -> PResult<Vec<Stmt>> {
        let start = self.mark();
        if self.expect_kind(TokenKind::Newline)?.is_some() {
            if self.expect_kind(TokenKind::Indent)?.is_some() {
                if let Some(body) = self.statements()? {
                    if self.expect_kind(TokenKind::Dedent)?.is_some() {
                        return Ok(Some(body));
                    }
                }
            }
            self.reset(start);
        }
        if let Some(body) = self.simple_stmts()? {
            return Ok(Some(body));
        }
        if self.call_invalid_rules() {
            self.invalid_block()?;
        }
        Ok(None)
    }

    /// ':' block
    fn colon_block(&mut self) -> PResult<Vec<Stmt>> {
        let start = self.mark();
        if self.expect(":")?.is_none() {
            return Ok(None);
        }
        match self.block()? {
            Some(body) => Ok(Some(body)),
            None => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    /// [else_block]
    fn else_block(&mut self) -> Result<Option<Vec<Stmt>>, ParseError> {
        let start = self.mark();
        if self.expect("else")?.is_none() {
            return Ok(None);
        }
        let body = self.colon_block()?;
        if body.is_none() {
            self.reset(start);
        }
        Ok(body)
    }

    /// ('@' named_expression NEWLINE)+ (function_def | class_def)
    fn decorated(&mut self) -> PResult<StmtKind> {
        let decorators = self.repeated(|p| {
            let start = p.mark();
            if p.expect("@")?.is_some() {
                if let Some(decorator) = p.named_expression()? {
                    if p.expect_kind(TokenKind::Newline)?.is_some() {
                        return Ok(Some(decorator));
                    }
                }
            }
            p.reset(start);
            Ok(None)
        })?;
        if decorators.is_empty() {
            return Ok(None);
        }
        let tok = self.peek()?.clone();
        match tok.text.as_str() {
            "def" => self.function_def(decorators, false),
            "class" => self.class_def(decorators),
            "async" => {
                self.advance()?;
                self.function_def(decorators, true)
            }
            _ => Ok(None),
        }
    }

    /// 'async' (function_def | for_stmt | with_stmt)
    fn async_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("async")?;
        let tok = self.peek()?.clone();
        match tok.text.as_str() {
            "def" => self.function_def(Vec::new(), true),
            "for" => self.for_stmt(true),
            "with" => self.with_stmt(true),
            _ => Ok(None),
        }
    }

    /// function_def: 'def' NAME '(' [params] ')' ['->' expression] ':' block
    fn function_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> PResult<StmtKind> {
        if self.expect("def")?.is_none() {
            return Ok(None);
        }
        let Some(name) = self.name()? else {
            return Ok(None);
        };
        if self.expect("(")?.is_none() {
            return Ok(None);
        }
        let Some(args) = self.parameters(true, ")")? else {
            return Ok(None);
        };
        if self.expect(")")?.is_none() {
            return Ok(None);
        }
        let mut returns = None;
        if self.expect("->")?.is_some() {
            returns = self.expression()?;
            if returns.is_none() {
                return Ok(None);
            }
        }
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        Ok(Some(StmtKind::FunctionDef {
            name: name.text,
            args,
            body,
            decorators,
            returns,
            is_async,
        }))
    }

    /// class_def: 'class' NAME ['(' [arguments] ')'] ':' block
    fn class_def(&mut self, decorators: Vec<Expr>) -> PResult<StmtKind> {
        if self.expect("class")?.is_none() {
            return Ok(None);
        }
        let Some(name) = self.name()? else {
            return Ok(None);
        };
        let (mut bases, mut keywords) = (Vec::new(), Vec::new());
        if self.expect("(")?.is_some() {
            let Some((args, kwargs)) = self.call_arguments()? else {
                return Ok(None);
            };
            if self.expect(")")?.is_none() {
                return Ok(None);
            }
            bases = args;
            keywords = kwargs;
        }
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        Ok(Some(StmtKind::ClassDef {
            name: name.text,
            bases,
            keywords,
            body,
            decorators,
        }))
    }

    /// if_stmt: ('if' | 'elif') named_expression ':' block (elif_stmt | [else_block])
    fn if_stmt(&mut self, keyword: &str) -> PResult<StmtKind> {
        if self.expect(keyword)?.is_none() {
            return Ok(None);
        }
        let Some(test) = self.named_expression()? else {
            return Ok(None);
        };
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        let orelse = if self.peek()?.text == "elif" {
            let start = self.mark();
            match self.if_stmt("elif")? {
                Some(kind) => vec![self.finish_stmt(start, kind)],
                None => return Ok(None),
            }
        } else {
            self.else_block()?.unwrap_or_default()
        };
        Ok(Some(StmtKind::If { test, body, orelse }))
    }

    /// while_stmt: 'while' named_expression ':' block [else_block]
    fn while_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("while")?;
        let Some(test) = self.named_expression()? else {
            return Ok(None);
        };
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        let orelse = self.else_block()?.unwrap_or_default();
        Ok(Some(StmtKind::While { test, body, orelse }))
    }

    /// for_stmt: 'for' star_targets 'in' ~ star_expressions ':' block [else_block]
    fn for_stmt(&mut self, is_async: bool) -> PResult<StmtKind> {
        if self.expect("for")?.is_none() {
            return Ok(None);
        }
        let Some(target) = self.star_targets()? else {
            return Ok(None);
        };
        if self.expect("in")?.is_none() {
            return Ok(None);
        }
        let Some(iter) = self.star_expressions()? else {
            return Ok(None);
        };
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        let orelse = self.else_block()?.unwrap_or_default();
        Ok(Some(StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        }))
    }

    /// with_stmt:
    ///     | 'with' '!' ','.with_item+ ':' MACRO_PARAM
    ///     | 'with' '(' ','.with_item+ ','? ')' ':' block
    ///     | 'with' ','.with_item+ ':' block
    fn with_stmt(&mut self, is_async: bool) -> PResult<StmtKind> {
        if self.expect("with")?.is_none() {
            return Ok(None);
        }
        if !is_async && self.expect("!")?.is_some() {
            return self.with_macro();
        }

        let after_with = self.mark();
        if self.expect("(")?.is_some() {
            if let Some(items) = self.gathered(",", Self::with_item)? {
                self.expect(",")?;
                if self.expect(")")?.is_some() {
                    if let Some(body) = self.colon_block()? {
                        return Ok(Some(StmtKind::With {
                            items,
                            body,
                            is_async,
                        }));
                    }
                }
            }
            self.reset(after_with);
        }

        let Some(items) = self.gathered(",", Self::with_item)? else {
            return Ok(None);
        };
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        Ok(Some(StmtKind::With {
            items,
            body,
            is_async,
        }))
    }

    /// The part of a `with!` statement after the `!`.
    fn with_macro(&mut self) -> PResult<StmtKind> {
        if self.call_invalid_rules() {
            self.invalid_with_macro()?;
        }
        let Some(items) = self.gathered(",", Self::with_item)? else {
            return Ok(None);
        };
        if self.expect(":")?.is_none() {
            return Ok(None);
        }
        let Some(block) = self.expect_kind(TokenKind::MacroParam)? else {
            return Ok(None);
        };
        Ok(Some(StmtKind::WithMacro {
            items,
            block: block.text,
        }))
    }

    /// with_item: expression 'as' star_target &(',' | ')' | ':') | expression
    pub(crate) fn with_item(&mut self) -> PResult<WithItem> {
        let Some(context) = self.expression()? else {
            return Ok(None);
        };
        let mark = self.mark();
        if self.expect("as")?.is_some() {
            if let Some(target) = self.star_target()? {
                let next = self.peek()?;
                if next.is_exact_type(",") || next.is_exact_type(")") || next.is_exact_type(":") {
                    return Ok(Some(WithItem {
                        context,
                        target: Some(target),
                    }));
                }
            }
            self.reset(mark);
        }
        Ok(Some(WithItem {
            context,
            target: None,
        }))
    }

    /// try_stmt:
    ///     | 'try' ':' block finally_block
    ///     | 'try' ':' block except_block+ [else_block] [finally_block]
    fn try_stmt(&mut self) -> PResult<StmtKind> {
        self.expect("try")?;
        let Some(body) = self.colon_block()? else {
            return Ok(None);
        };
        let handlers = self.repeated(Self::except_block)?;
        let orelse = if handlers.is_empty() {
            Vec::new()
        } else {
            self.else_block()?.unwrap_or_default()
        };
        let finalbody = match self.expect("finally")? {
            Some(_) => match self.colon_block()? {
                Some(body) => body,
                None => return Ok(None),
            },
            None => Vec::new(),
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Ok(None);
        }
        Ok(Some(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        }))
    }

    /// except_block: 'except' [expression ['as' NAME]] ':' block
    fn except_block(&mut self) -> PResult<ExceptHandler> {
        let start = self.mark();
        if self.expect("except")?.is_none() {
            return Ok(None);
        }
        let kind = self.expression()?;
        let mut name = None;
        if kind.is_some() && self.expect("as")?.is_some() {
            match self.name()? {
                Some(tok) => name = Some(tok.text),
                None => {
                    self.reset(start);
                    return Ok(None);
                }
            }
        }
        let Some(body) = self.colon_block()? else {
            self.reset(start);
            return Ok(None);
        };
        Ok(Some(ExceptHandler {
            kind,
            name,
            body,
            span: self.span_from(start),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(source: &str) -> Module {
        let mut p = Parser::from_str(source);
        p.file().unwrap().expect("source should parse")
    }

    fn kinds(source: &str) -> Vec<StmtKind> {
        module(source).body.into_iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_simple_statements() {
        let body = kinds("x = 1; y += 2\npass\nreturn a, b\ndel x[0], y\n");
        assert!(matches!(body[0], StmtKind::Assign { ref targets, .. } if targets.len() == 1));
        assert!(matches!(body[1], StmtKind::AugAssign { op: BinOp::Add, .. }));
        assert!(matches!(body[2], StmtKind::Pass));
        assert!(matches!(body[3], StmtKind::Return(Some(Expr { kind: ExprKind::Tuple(_), .. }))));
        assert!(matches!(body[4], StmtKind::Delete(ref targets) if targets.len() == 2));
    }

    #[test]
    fn test_chained_and_annotated_assignment() {
        let body = kinds("a = b = c\nx: int = 5\n$PATH = []\n");
        assert!(matches!(body[0], StmtKind::Assign { ref targets, .. } if targets.len() == 2));
        assert!(matches!(body[1], StmtKind::AnnAssign { value: Some(_), .. }));
        assert!(matches!(
            body[2],
            StmtKind::Assign { ref targets, .. } if matches!(targets[0].kind, ExprKind::Env(_))
        ));
    }

    #[test]
    fn test_imports() {
        let body = kinds("import os.path as p, sys\nfrom ..pkg import (a, b as c,)\nfrom . import *\n");
        assert!(matches!(body[0], StmtKind::Import(ref names) if names[0].name == "os.path" && names[0].asname.as_deref() == Some("p")));
        assert!(matches!(body[1], StmtKind::ImportFrom { level: 2, ref names, .. } if names.len() == 2));
        assert!(matches!(body[2], StmtKind::ImportFrom { module: None, level: 1, .. }));
    }

    #[test]
    fn test_compound_statements() {
        let source = "\
if a:
    pass
elif b:
    x = 1
else:
    y = 2
for i, j in pairs:
    continue
while True: break
";
        let body = kinds(source);
        let StmtKind::If { ref orelse, .. } = body[0] else {
            panic!("expected if");
        };
        assert!(matches!(orelse[0].kind, StmtKind::If { ref orelse, .. } if orelse.len() == 1));
        assert!(matches!(body[1], StmtKind::For { target: Expr { kind: ExprKind::Tuple(_), .. }, .. }));
        assert!(matches!(body[2], StmtKind::While { ref body, .. } if matches!(body[0].kind, StmtKind::Break)));
    }

    #[test]
    fn test_definitions() {
        let source = "\
@decorator
async def f(a, b: int = 1, *args, key, **kw) -> str:
    return a

class C(Base, metaclass=M):
    def method(self): ...
";
        let body = kinds(source);
        let StmtKind::FunctionDef { ref args, ref decorators, is_async, ref returns, .. } = body[0] else {
            panic!("expected def");
        };
        assert!(is_async);
        assert_eq!(decorators.len(), 1);
        assert_eq!(args.args.len(), 2);
        assert!(args.args[1].annotation.is_some());
        assert_eq!(args.kwonly.len(), 1);
        assert!(returns.is_some());
        assert!(matches!(body[1], StmtKind::ClassDef { ref bases, ref keywords, .. } if bases.len() == 1 && keywords.len() == 1));
    }

    #[test]
    fn test_try_and_with() {
        let source = "\
try:
    pass
except (A, B) as e:
    raise X from e
else:
    pass
finally:
    pass
with open(p) as f, lock:
    pass
";
        let body = kinds(source);
        assert!(matches!(body[0], StmtKind::Try { ref handlers, ref finalbody, .. } if handlers[0].name.as_deref() == Some("e") && finalbody.len() == 1));
        assert!(matches!(body[1], StmtKind::With { ref items, .. } if items.len() == 2 && items[0].target.is_some()));
    }

    #[test]
    fn test_with_macro_block() {
        let body = kinds("with! Block() as b:\n    raw text\n      more\nx = 1\n");
        assert!(matches!(body[0], StmtKind::WithMacro { ref block, .. } if block == "raw text\n  more\n"));
        assert!(matches!(body[1], StmtKind::Assign { .. }));
    }

    #[test]
    fn test_statement_spans() {
        let module = module("x = 1\n\nfoo(bar)\n");
        assert_eq!(module.body[1].span.start.line, 3);
        assert_eq!(module.body[1].span.end.column, 8);
    }
}
