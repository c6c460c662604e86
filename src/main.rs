// xonsh-parser: tokenize, parse and trace xonsh source

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use xonsh_parser::parser::error::SyntaxError;
use xonsh_parser::parser::runtime::{Mode, ParserOptions};
use xonsh_parser::parser::{parser_for_file, parser_for_string};
use xonsh_parser::tokenizer::lexer::DEFAULT_TABSIZE;
use xonsh_parser::tokenizer::{Lexer, TokenInfo, TokenKind, Tokenizer};
use xonsh_parser::trace::TraceLog;
use xonsh_parser::ui::App;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    /// A whole module of statements
    Exec,
    /// A single expression
    Eval,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Exec => Mode::Exec,
            ModeArg::Eval => Mode::Eval,
        }
    }
}

#[derive(Parser)]
#[command(name = "xonsh-parser", version)]
#[command(about = "Tokenize and parse xonsh source, or step through the parse in a TUI")]
struct Args {
    /// Source file to read, or `-` for stdin
    file: PathBuf,

    /// Start rule
    #[arg(long, value_enum, default_value_t = ModeArg::Exec)]
    mode: ModeArg,

    /// Print the token stream instead of the AST
    #[arg(long)]
    tokens: bool,

    /// With --tokens, print every lexer token including whitespace and comments
    #[arg(long, requires = "tokens")]
    raw: bool,

    /// Print the AST (the default when no other action is given)
    #[arg(long)]
    ast: bool,

    /// Record the parse and open the trace viewer
    #[arg(long)]
    trace: bool,

    /// Maximum number of trace events to record
    #[arg(long, default_value_t = 100_000)]
    trace_limit: usize,

    /// Column width of a tab when measuring indentation
    #[arg(long, default_value_t = DEFAULT_TABSIZE)]
    tabsize: usize,

    /// Log filter, e.g. `debug` or `xonsh_parser::parser=trace` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn reads_stdin(&self) -> bool {
        self.file == Path::new("-")
    }

    fn options(&self) -> ParserOptions {
        let filename = if self.reads_stdin() {
            "<stdin>".to_string()
        } else {
            self.file.display().to_string()
        };
        ParserOptions::default()
            .with_filename(filename)
            .with_mode(self.mode.into())
            .with_tabsize(self.tabsize)
            .verbose(self.trace)
            .with_trace_limit(self.trace_limit)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_stdin() -> io::Result<String> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;
    Ok(source)
}

fn format_token(tok: &TokenInfo) -> String {
    let range = format!(
        "{},{}-{},{}:",
        tok.start.line, tok.start.column, tok.end.line, tok.end.column
    );
    format!("{:<20}{:<15}{:?}", range, tok.kind.name(), tok.text)
}

fn dump_tokens(args: &Args, stdin: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let lexer = match stdin {
        Some(source) => Lexer::new(source).with_tabsize(args.tabsize),
        None => Lexer::new(&fs::read_to_string(&args.file)?).with_tabsize(args.tabsize),
    };
    if args.raw {
        let mut lexer = lexer;
        for tok in lexer.tokenize()? {
            println!("{}", format_token(&tok));
        }
        return Ok(());
    }
    let mut tokenizer = Tokenizer::new(lexer);
    loop {
        let tok = tokenizer.getnext()?;
        println!("{}", format_token(&tok));
        if tok.kind == TokenKind::EndMarker {
            break;
        }
    }
    Ok(())
}

fn run_viewer(source: String, tokens: Vec<TokenInfo>, trace: TraceLog, error: Option<SyntaxError>) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(source, tokens, trace, error);
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let stdin = if args.reads_stdin() {
        Some(read_stdin()?)
    } else {
        if !args.file.exists() {
            eprintln!("Error: File '{}' not found", args.file.display());
            std::process::exit(1);
        }
        None
    };

    if args.tokens {
        if let Err(err) = dump_tokens(&args, stdin.as_deref()) {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
        return Ok(());
    }

    let options = args.options();
    info!(file = %options.filename, mode = ?options.mode, "parsing");
    let mut parser = match &stdin {
        Some(source) => parser_for_string(source, options),
        None => match parser_for_file(&args.file, options) {
            Ok(parser) => parser,
            Err(err) => {
                eprintln!("{}", err.render());
                std::process::exit(1);
            }
        },
    };
    let result = parser.parse_ast();

    if args.trace {
        let source = match stdin {
            Some(source) => source,
            None => fs::read_to_string(&args.file)?,
        };
        let tokens = parser.tokenizer().tokens().to_vec();
        let trace = parser
            .take_trace()
            .unwrap_or_else(|| TraceLog::new(args.trace_limit));
        debug!(events = trace.len(), dropped = trace.dropped(), "opening trace viewer");
        run_viewer(source, tokens, trace, result.clone().err())?;
        if !args.ast {
            return Ok(());
        }
    }

    match result {
        Ok(ast) => {
            println!("{:#?}", ast);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.render());
            std::process::exit(1);
        }
    }
}
