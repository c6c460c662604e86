//! Subprocess literal rules
//!
//! Inside `$(...)`, `$[...]`, `!(...)`, `![...]` and `@$(...)` the lexer
//! hands over argument words instead of Python tokens. These rules split
//! the words into pipeline stages and glue physically adjacent pieces
//! (`$HOME/bin`, `@(x).txt`) into a single argument.

use super::ast::*;
use super::runtime::{Cut, PResult, Parser, RuleId};
use crate::tokenizer::{Position, TokenInfo, TokenKind};

const SUB_PROCS: RuleId = RuleId::new("sub_procs");

const REDIRECTS: [&str; 4] = [">", ">>", "<", ">&"];

/// Join `piece` onto the argument it touches.
fn glue(last: Arg, piece: Arg) -> Arg {
    match (last, piece) {
        (Arg::Word(mut left), Arg::Word(right)) => {
            left.push_str(&right);
            Arg::Word(left)
        }
        (Arg::Concat(mut parts), piece) => {
            match (parts.last_mut(), piece) {
                (Some(Arg::Word(left)), Arg::Word(right)) => left.push_str(&right),
                (_, piece) => parts.push(piece),
            }
            Arg::Concat(parts)
        }
        (last, piece) => Arg::Concat(vec![last, piece]),
    }
}

/// Redirections and macro text always stand alone.
fn stands_alone(arg: &Arg) -> bool {
    matches!(arg, Arg::Redirect(_) | Arg::Macro(_))
}

impl Parser {
    /// sub_procs:
    ///     | '$(' ~ proc_cmds ')'
    ///     | '$[' ~ proc_cmds ']'
    ///     | '![' ~ proc_cmds ']'
    ///     | '!(' ~ proc_cmds ')'
    ///     | '@$(' ~ proc_cmds ')'
    pub(crate) fn sub_procs(&mut self) -> PResult<Expr> {
        self.memoize(SUB_PROCS, |p| {
            p.choice(&[
                Self::captured_stdout,
                Self::uncaptured,
                Self::hidden_object,
                Self::captured_object,
                Self::injected,
            ])
        })
    }

    fn captured_stdout(&mut self, cut: &mut Cut) -> PResult<Expr> {
        self.subproc_literal(cut, "$(", ")")
    }

    fn uncaptured(&mut self, cut: &mut Cut) -> PResult<Expr> {
        self.subproc_literal(cut, "$[", "]")
    }

    fn hidden_object(&mut self, cut: &mut Cut) -> PResult<Expr> {
        self.subproc_literal(cut, "![", "]")
    }

    fn captured_object(&mut self, cut: &mut Cut) -> PResult<Expr> {
        self.subproc_literal(cut, "!(", ")")
    }

    fn injected(&mut self, cut: &mut Cut) -> PResult<Expr> {
        self.subproc_literal(cut, "@$(", ")")
    }

    fn subproc_literal(&mut self, cut: &mut Cut, opener: &str, closer: &str) -> PResult<Expr> {
        let start = self.mark();
        let Some(open) = self.expect(opener)? else {
            return Ok(None);
        };
        cut.commit();
        if self.call_invalid_rules() {
            self.invalid_subproc(&open, closer)?;
        }
        let Some(capture) = Capture::from_opener(opener) else {
            return Ok(None);
        };
        let Some(stages) = self.proc_cmds(closer)? else {
            return Ok(None);
        };
        let background = self.expect("&")?.is_some();
        if self.expect(closer)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.finish(
            start,
            ExprKind::Subproc(Subproc {
                capture,
                stages,
                background,
            }),
        )))
    }

    /// proc_cmds: proc_cmd (('|' | '&&' | '||' | 'and' | 'or') proc_cmd)*
    fn proc_cmds(&mut self, closer: &str) -> PResult<Vec<Stage>> {
        let Some(argv) = self.proc_cmd(closer)? else {
            return Ok(None);
        };
        let mut stages = vec![Stage {
            connector: None,
            argv,
        }];
        loop {
            let mark = self.mark();
            let Some(connector) = self.connector()? else {
                break;
            };
            match self.proc_cmd(closer)? {
                Some(argv) => stages.push(Stage {
                    connector: Some(connector),
                    argv,
                }),
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Ok(Some(stages))
    }

    fn connector(&mut self) -> PResult<Connector> {
        const CONNECTORS: [(&str, Connector); 5] = [
            ("|", Connector::Pipe),
            ("&&", Connector::And),
            ("and", Connector::And),
            ("||", Connector::Or),
            ("or", Connector::Or),
        ];
        for (spelling, connector) in CONNECTORS {
            if self.expect(spelling)?.is_some() {
                return Ok(Some(connector));
            }
        }
        Ok(None)
    }

    fn at_command_end(tok: &TokenInfo, closer: &str) -> bool {
        match tok.kind {
            TokenKind::Op => {
                tok.text == closer || matches!(tok.text.as_str(), "|" | "&&" | "||" | "&")
            }
            TokenKind::Word => matches!(tok.text.as_str(), "and" | "or"),
            _ => false,
        }
    }

    /// proc_cmd: proc_arg+
    ///
    /// Plain brackets that are not the literal's own closer are argument
    /// text, so `find . -exec rm {} ;` keeps its `{}`.
    fn proc_cmd(&mut self, closer: &str) -> PResult<Vec<Arg>> {
        let mut argv: Vec<Arg> = Vec::new();
        let mut depth = 0usize;
        let mut prev_end: Option<Position> = None;
        loop {
            let tok = self.peek()?.clone();
            if depth == 0 && Self::at_command_end(&tok, closer) {
                break;
            }
            let mark = self.mark();
            let Some(piece) = self.proc_piece(&tok, &mut depth)? else {
                self.reset(mark);
                break;
            };
            let touches = prev_end == Some(tok.start)
                && !stands_alone(&piece)
                && !argv.last().is_some_and(stands_alone);
            prev_end = self.tokenizer().get_last_non_whitespace_token().map(|t| t.end);
            match argv.pop() {
                Some(last) if touches => argv.push(glue(last, piece)),
                Some(last) => {
                    argv.push(last);
                    argv.push(piece);
                }
                None => argv.push(piece),
            }
        }
        Ok((!argv.is_empty()).then_some(argv))
    }

    /// One argument piece starting at `tok`.
    fn proc_piece(&mut self, tok: &TokenInfo, depth: &mut usize) -> PResult<Arg> {
        match tok.kind {
            TokenKind::Word | TokenKind::Name | TokenKind::Number => {
                self.advance()?;
                Ok(Some(Arg::Word(tok.text.clone())))
            }
            TokenKind::String => {
                self.advance()?;
                Ok(Some(Arg::Quoted(tok.text.clone())))
            }
            TokenKind::FStringStart => Ok(self.strings()?.map(Arg::PyExpr)),
            TokenKind::SearchPath => Ok(self.search_path()?.and_then(|expr| match expr.kind {
                ExprKind::SearchPath(search) => Some(Arg::SearchPath(search)),
                _ => None,
            })),
            TokenKind::Op => self.proc_operator(tok, depth),
            _ => Ok(None),
        }
    }

    fn proc_operator(&mut self, tok: &TokenInfo, depth: &mut usize) -> PResult<Arg> {
        let text = tok.text.as_str();
        match text {
            "$" | "${" => Ok(self.env_atom()?.and_then(|expr| match expr.kind {
                ExprKind::Env(name) => Some(Arg::Env(name)),
                ExprKind::EnvExpr(value) => Some(Arg::EnvExpr(*value)),
                _ => None,
            })),
            "@(" => {
                let start = self.mark();
                self.advance()?;
                if let Some(value) = self.star_expressions()? {
                    if self.expect(")")?.is_some() {
                        return Ok(Some(Arg::PyExpr(value)));
                    }
                }
                self.reset(start);
                Ok(None)
            }
            "$(" | "$[" | "![" | "!(" | "@$(" => {
                Ok(self.sub_procs()?.and_then(|expr| match expr.kind {
                    ExprKind::Subproc(sub) => Some(Arg::Subproc(sub)),
                    _ => None,
                }))
            }
            "!" => {
                let start = self.mark();
                self.advance()?;
                match self.expect_kind(TokenKind::MacroParam)? {
                    Some(param) => Ok(Some(Arg::Macro(param.text))),
                    None => {
                        self.reset(start);
                        Ok(None)
                    }
                }
            }
            "!=" => {
                self.advance()?;
                Ok(Some(Arg::Word(tok.text.clone())))
            }
            _ if REDIRECTS.contains(&text) => {
                self.advance()?;
                Ok(Some(Arg::Redirect(tok.text.clone())))
            }
            "(" | "[" | "{" => {
                self.advance()?;
                *depth += 1;
                Ok(Some(Arg::Word(tok.text.clone())))
            }
            ")" | "]" | "}" if *depth > 0 => {
                self.advance()?;
                *depth -= 1;
                Ok(Some(Arg::Word(tok.text.clone())))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subproc(source: &str) -> Subproc {
        let mut p = Parser::from_str(source);
        match p.atom().unwrap().map(|e| e.kind) {
            Some(ExprKind::Subproc(sub)) => sub,
            other => panic!("expected a subprocess literal, got {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_stages() {
        let sub = subproc("$(ls | grep wakka)");
        assert_eq!(sub.capture, Capture::Stdout);
        assert_eq!(sub.argvs(), vec![vec!["ls"], vec!["grep", "wakka"]]);
        assert_eq!(sub.stages[1].connector, Some(Connector::Pipe));
    }

    #[test]
    fn test_logical_connectors_and_background() {
        let sub = subproc("$[make && ./run || echo failed &]");
        assert_eq!(sub.capture, Capture::Uncaptured);
        assert!(sub.background);
        let connectors: Vec<_> = sub.stages.iter().map(|s| s.connector).collect();
        assert_eq!(connectors, vec![None, Some(Connector::And), Some(Connector::Or)]);
    }

    #[test]
    fn test_adjacent_pieces_form_one_argument() {
        let sub = subproc("![cd $HOME/bin]");
        assert_eq!(sub.capture, Capture::HiddenObject);
        assert_eq!(sub.argvs(), vec![vec!["cd", "$HOME/bin"]]);
        assert!(matches!(sub.stages[0].argv[1], Arg::Concat(ref parts) if parts.len() == 2));

        let sub = subproc("!(find . -exec rm {} ;)");
        assert_eq!(sub.argvs(), vec![vec!["find", ".", "-exec", "rm", "{}", ";"]]);
    }

    #[test]
    fn test_python_and_nested_pieces() {
        let sub = subproc("$(echo @(x + 1) \"hi\" $(pwd)/sub)");
        let argv = &sub.stages[0].argv;
        assert!(matches!(argv[1], Arg::PyExpr(Expr { kind: ExprKind::BinOp { .. }, .. })));
        assert!(matches!(argv[2], Arg::Quoted(ref text) if text == "\"hi\""));
        assert!(matches!(argv[3], Arg::Concat(ref parts) if matches!(parts[0], Arg::Subproc(_))));
    }

    #[test]
    fn test_redirects_stand_alone() {
        let sub = subproc("$[sort <in.txt >>out.txt]");
        assert_eq!(sub.argvs(), vec![vec!["sort", "<", "in.txt", ">>", "out.txt"]]);
    }

    #[test]
    fn test_not_equal_is_a_plain_argument() {
        let sub = subproc("$(test a != b)");
        assert_eq!(sub.argvs(), vec![vec!["test", "a", "!=", "b"]]);
        assert!(sub.stages[0].argv.iter().all(|arg| !matches!(arg, Arg::Macro(_))));
    }

    #[test]
    fn test_proc_macro_argument() {
        let sub = subproc("$(echo -n ! x y )");
        assert!(matches!(sub.stages[0].argv.last(), Some(Arg::Macro(text)) if text == "x y"));
    }

    #[test]
    fn test_unclosed_literal_does_not_match() {
        let mut p = Parser::from_str("$(ls |)");
        assert!(p.atom().unwrap().is_none());
        assert_eq!(p.mark(), 0);
    }
}
