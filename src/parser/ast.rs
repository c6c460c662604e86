// AST definitions for the shell language

use crate::tokenizer::Position;

/// Source range of a node: from the start of its first token to the end of
/// its last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }
}

/// A parsed file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// Result of a parse, depending on the mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Module(Module),
    Expression(Expr),
}

// ----- statements --------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    /// `a = b = value`
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Return(Option<Expr>),
    Pass,
    Break,
    Continue,
    Delete(Vec<Expr>),
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Import(Vec<Alias>),
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        /// Number of leading dots.
        level: usize,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    FunctionDef {
        name: String,
        args: Arguments,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
        returns: Option<Expr>,
        is_async: bool,
    },
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        keywords: Vec<Keyword>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    /// `with! ctx:` followed by a raw, unparsed block.
    WithMacro {
        items: Vec<WithItem>,
        block: String,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Formal parameters of a `def` or `lambda`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    pub args: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// `name=value` in a call, or `**value` when `arg` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

// ----- expressions -------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Constant(Constant),
    /// f-string
    JoinedStr(Vec<FStringPart>),
    /// `p"..."` or `pf"..."`; wraps the string or f-string.
    Path(Box<Expr>),
    SearchPath(SearchPath),
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Lambda {
        args: Box<Arguments>,
        body: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// `keys[i]` is `None` for a `**mapping` entry.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Set(Vec<Expr>),
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// `func!(raw, args)`; arguments are kept as source text.
    MacroCall {
        func: Box<Expr>,
        args: Vec<String>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Starred(Box<Expr>),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `$NAME`
    Env(String),
    /// `${expr}`
    EnvExpr(Box<Expr>),
    Subproc(Subproc),
    /// `x?` or `x??`
    Help {
        target: Box<Expr>,
        superhelp: bool,
    },
}

impl ExprKind {
    /// How the expression is named in "cannot assign to ..." messages.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Name(_) => "name",
            ExprKind::Constant(Constant::None | Constant::True | Constant::False) => "keyword",
            ExprKind::Constant(Constant::Ellipsis) => "ellipsis",
            ExprKind::Constant(_) | ExprKind::JoinedStr(_) | ExprKind::Path(_) => "literal",
            ExprKind::SearchPath(_) => "search path",
            ExprKind::BoolOp { .. } | ExprKind::BinOp { .. } | ExprKind::UnaryOp { .. } => {
                "expression"
            }
            ExprKind::NamedExpr { .. } => "named expression",
            ExprKind::Lambda { .. } => "lambda",
            ExprKind::IfExp { .. } => "conditional expression",
            ExprKind::Dict { .. } => "dict literal",
            ExprKind::Set(_) => "set display",
            ExprKind::ListComp { .. } => "list comprehension",
            ExprKind::SetComp { .. } => "set comprehension",
            ExprKind::DictComp { .. } => "dict comprehension",
            ExprKind::GeneratorExp { .. } => "generator expression",
            ExprKind::Await(_) => "await expression",
            ExprKind::Yield(_) | ExprKind::YieldFrom(_) => "yield expression",
            ExprKind::Compare { .. } => "comparison",
            ExprKind::Call { .. } => "function call",
            ExprKind::MacroCall { .. } => "macro call",
            ExprKind::Attribute { .. } => "attribute",
            ExprKind::Subscript { .. } => "subscript",
            ExprKind::Starred(_) => "starred",
            ExprKind::List(_) => "list",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Slice { .. } => "slice",
            ExprKind::Env(_) | ExprKind::EnvExpr(_) => "environment variable",
            ExprKind::Subproc(_) => "subprocess",
            ExprKind::Help { .. } => "help expression",
        }
    }

    /// Valid on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        match self {
            ExprKind::Name(_)
            | ExprKind::Attribute { .. }
            | ExprKind::Subscript { .. }
            | ExprKind::Env(_)
            | ExprKind::EnvExpr(_) => true,
            ExprKind::Starred(inner) => inner.kind.is_assignable(),
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                items.iter().all(|e| e.kind.is_assignable())
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    True,
    False,
    Ellipsis,
    /// Numeric literal as written.
    Number(String),
    Str(String),
    Bytes(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Field {
        value: Box<Expr>,
        /// Source text of `expr=` fields, including the `=`.
        debug_text: Option<String>,
        conversion: Option<char>,
        format_spec: Vec<FStringPart>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    Regex,
    Glob,
    /// `@name` prefix: a user supplied search function.
    Custom(String),
}

/// A backtick path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    pub kind: SearchKind,
    pub pattern: String,
    /// `p` flag: yield path objects rather than strings.
    pub as_paths: bool,
    /// `f` flag: the pattern is an f-string.
    pub formatted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl BinOp {
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mult,
            "@" => BinOp::MatMult,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            "//" => BinOp::FloorDiv,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

// ----- subprocesses ------------------------------------------------------

/// What a subprocess literal evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// `$(...)`: captured stdout as a string.
    Stdout,
    /// `$[...]`: output goes to the terminal, evaluates to nothing.
    Uncaptured,
    /// `![...]`: output goes to the terminal, evaluates to a process object.
    HiddenObject,
    /// `!(...)`: fully captured process object.
    Object,
    /// `@$(...)`: stdout split into arguments.
    Inject,
}

impl Capture {
    pub fn from_opener(opener: &str) -> Option<Capture> {
        Some(match opener {
            "$(" => Capture::Stdout,
            "$[" => Capture::Uncaptured,
            "![" => Capture::HiddenObject,
            "!(" => Capture::Object,
            "@$(" => Capture::Inject,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `|`
    Pipe,
    /// `&&` or `and`
    And,
    /// `||` or `or`
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subproc {
    pub capture: Capture,
    pub stages: Vec<Stage>,
    /// Trailing `&`.
    pub background: bool,
}

impl Subproc {
    /// Argument text of every stage, for quick inspection.
    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.stages
            .iter()
            .map(|stage| stage.argv.iter().map(Arg::source_text).collect())
            .collect()
    }
}

/// One command of a pipeline, with the connector that joins it to the
/// previous command (`None` for the first).
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub connector: Option<Connector>,
    pub argv: Vec<Arg>,
}

/// One command line argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Word(String),
    /// A quoted string, quotes and prefix included.
    Quoted(String),
    /// `$NAME`
    Env(String),
    /// `${expr}`
    EnvExpr(Expr),
    /// `@(expr)`
    PyExpr(Expr),
    /// `@$(cmd)`, or a nested `$(...)`, `!(...)` etc.
    Subproc(Subproc),
    SearchPath(SearchPath),
    /// `>`, `>>`, `<`, `>&`
    Redirect(String),
    /// Text after `cmd !`.
    Macro(String),
    /// Physically adjacent pieces forming one argument, like `$HOME/bin`.
    Concat(Vec<Arg>),
}

impl Arg {
    /// Approximate source spelling.
    pub fn source_text(&self) -> String {
        match self {
            Arg::Word(text) | Arg::Quoted(text) | Arg::Redirect(text) | Arg::Macro(text) => {
                text.clone()
            }
            Arg::Env(name) => format!("${name}"),
            Arg::EnvExpr(_) => "${...}".to_string(),
            Arg::PyExpr(_) => "@(...)".to_string(),
            Arg::Subproc(sub) => match sub.capture {
                Capture::Stdout => "$(...)",
                Capture::Uncaptured => "$[...]",
                Capture::HiddenObject => "![...]",
                Capture::Object => "!(...)",
                Capture::Inject => "@$(...)",
            }
            .to_string(),
            Arg::SearchPath(search) => format!("`{}`", search.pattern),
            Arg::Concat(parts) => parts.iter().map(Arg::source_text).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(id: &str) -> Expr {
        Expr::new(ExprKind::Name(id.to_string()), Span::default())
    }

    #[test]
    fn test_assignable_targets() {
        assert!(name("x").kind.is_assignable());
        let tuple = ExprKind::Tuple(vec![name("a"), Expr::new(ExprKind::Starred(name("b").boxed()), Span::default())]);
        assert!(tuple.is_assignable());
        let call = ExprKind::Call {
            func: name("f").boxed(),
            args: vec![],
            keywords: vec![],
        };
        assert!(!call.is_assignable());
        assert_eq!(call.describe(), "function call");
    }

    #[test]
    fn test_argv_text() {
        let sub = Subproc {
            capture: Capture::Stdout,
            stages: vec![
                Stage {
                    connector: None,
                    argv: vec![Arg::Word("ls".into())],
                },
                Stage {
                    connector: Some(Connector::Pipe),
                    argv: vec![
                        Arg::Word("cd".into()),
                        Arg::Concat(vec![Arg::Env("HOME".into()), Arg::Word("/bin".into())]),
                    ],
                },
            ],
            background: false,
        };
        assert_eq!(sub.argvs(), vec![vec!["ls"], vec!["cd", "$HOME/bin"]]);
    }
}
