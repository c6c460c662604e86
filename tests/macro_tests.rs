// Integration tests for call macros, subprocess macros and with! blocks

use xonsh_parser::parser::ast::*;
use xonsh_parser::parser::parse_string;
use xonsh_parser::parser::runtime::ParserOptions;
use xonsh_parser::tokenizer::{tokenize_all, TokenKind};

fn body(source: &str) -> Vec<StmtKind> {
    match parse_string(source, ParserOptions::default()) {
        Ok(Ast::Module(module)) => module.body.into_iter().map(|s| s.kind).collect(),
        other => panic!("expected a module, got {other:?}"),
    }
}

fn macro_args(source: &str) -> Vec<String> {
    match body(source).remove(0) {
        StmtKind::Expr(Expr {
            kind: ExprKind::MacroCall { args, .. },
            ..
        }) => args,
        other => panic!("expected a macro call, got {other:?}"),
    }
}

#[test]
fn test_call_macro_arguments_are_raw_text() {
    assert_eq!(
        macro_args("f!(x + 1, [a,\n  b], 'c,d')\n"),
        vec!["x + 1", "[a,\n  b]", "'c,d'"]
    );
}

#[test]
fn test_call_macro_strips_and_drops_blank_trailing_argument() {
    assert_eq!(macro_args("f!(  x  , )\n"), vec!["x"]);
    assert!(macro_args("f!()\n").is_empty());
}

#[test]
fn test_call_macro_result_is_an_expression() {
    let stmts = body("y = g!(if x) + 1\n");
    let StmtKind::Assign { value, .. } = &stmts[0] else {
        panic!("expected an assignment");
    };
    let ExprKind::BinOp { left, .. } = &value.kind else {
        panic!("expected a binary operation");
    };
    assert!(matches!(
        left.kind,
        ExprKind::MacroCall { ref func, ref args }
            if matches!(func.kind, ExprKind::Name(ref n) if n == "g") && args == &vec!["if x".to_string()]
    ));
}

#[test]
fn test_macro_needs_the_bang_next_to_the_name() {
    let tokens = tokenize_all("f !(ls)\n").unwrap();
    assert!(tokens.iter().all(|t| t.kind != TokenKind::MacroParam));
    assert!(tokens.iter().any(|t| t.is_exact_type("!(")));
}

#[test]
fn test_subprocess_macro_takes_the_rest() {
    let stmts = body("x = $(timeit! python -c 'pass' | cat)\n");
    let StmtKind::Assign { value, .. } = &stmts[0] else {
        panic!("expected an assignment");
    };
    let ExprKind::Subproc(sub) = &value.kind else {
        panic!("expected a subprocess literal");
    };
    assert_eq!(sub.stages.len(), 1);
    assert!(matches!(
        sub.stages[0].argv.as_slice(),
        [Arg::Word(cmd), Arg::Macro(rest)] if cmd == "timeit" && rest == "python -c 'pass' | cat"
    ));
}

#[test]
fn test_with_macro_line_form() {
    let stmts = body("with! ctx: y = [1,\n  2]\nz = 3\n");
    assert!(matches!(
        stmts[0],
        StmtKind::WithMacro { ref items, ref block } if items.len() == 1 && block == " y = [1,\n  2]\n"
    ));
    assert!(matches!(stmts[1], StmtKind::Assign { .. }));
}

#[test]
fn test_with_macro_block_form_dedents_and_keeps_blank_lines() {
    let source = "def f():\n    with! Ctx() as c, other:\n        a = 1\n\n        if a:\n            $(ls)\n    return c\n";
    let stmts = body(source);
    let StmtKind::FunctionDef { body, .. } = &stmts[0] else {
        panic!("expected a function definition");
    };
    assert!(matches!(
        body[0].kind,
        StmtKind::WithMacro { ref items, ref block }
            if items.len() == 2
                && items[0].target.is_some()
                && block == "a = 1\n\nif a:\n    $(ls)\n"
    ));
    assert!(matches!(body[1].kind, StmtKind::Return(Some(_))));
}
