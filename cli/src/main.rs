mod test_runner;

use std::path::Path;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use expander::variable::parse_literal;
use expander::{ArraySyntax, DiagnosticError, Expander, Options};

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "grx", version, about = "Grid expansion macro compiler")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print full diagnostics and raise the log level (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a grx document and print the result
    Run(RunArgs),

    /// Run .test.grx test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Source file to expand
    file: String,

    /// Dump the lexed token tree instead of expanding
    #[arg(long)]
    tokens: bool,

    /// Lex and parse only, don't execute (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Default counter range as LO,HI
    #[arg(long, value_parser = parse_range)]
    default_range: Option<(i64, i64)>,

    /// Array syntax of the target language (c or fortran)
    #[arg(long, value_parser = parse_array_syntax)]
    array_syntax: Option<ArraySyntax>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.grx file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn parse_range(s: &str) -> Result<(i64, i64), String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LO,HI, got '{}'", s))?;
    let bound = |text: &str| parse_literal(text).map_err(|e| e.to_string());
    Ok((bound(lo)?, bound(hi)?))
}

fn parse_array_syntax(s: &str) -> Result<ArraySyntax, String> {
    s.parse::<ArraySyntax>().map_err(|e| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    // If the first positional arg is not a known subcommand, inject "run"
    // so `grx file.grx` works like `grx run file.grx`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color, cli.verbose > 0),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn do_run(args: RunArgs, no_color: bool, verbose: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let report = Reporter {
        files: &files,
        file_id,
        color_choice,
        verbose,
    };

    let expander = Expander::new(Options {
        default_range: args.default_range,
        array_syntax: args.array_syntax,
    });

    let document = match expander.lex(&source, file_id) {
        Ok(document) => document,
        Err(error) => report.fail(&error),
    };
    debug!(tokens = document.tokens.len(), file = %args.file, "lexed");

    if args.tokens {
        print!("{}", dump_tokens(&document));
        return;
    }

    let block = match expander.parse(&document) {
        Ok(block) => block,
        Err(error) => report.fail(&error),
    };

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    match block.execute() {
        Ok(output) => print!("{}", output),
        Err(error) => report.fail(&error),
    }
}

/// Prints a pipeline error in short or full form, then exits.
struct Reporter<'a> {
    files: &'a SimpleFiles<String, String>,
    file_id: usize,
    color_choice: ColorChoice,
    verbose: bool,
}

impl Reporter<'_> {
    fn fail(&self, error: &DiagnosticError) -> ! {
        if self.verbose {
            let writer = StandardStream::stderr(self.color_choice);
            let config = term::Config::default();
            let diagnostic = error.to_diagnostic(self.file_id);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, self.files, &diagnostic);
        } else {
            eprintln!("error: {}", error.short_message());
        }
        process::exit(1);
    }
}

fn dump_tokens(document: &grx::Document) -> String {
    document.tokens.dump()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_flag_parses_two_bounds() {
        assert_eq!(parse_range("0,2"), Ok((0, 2)));
        assert_eq!(parse_range(" 1 , 3 "), Ok((1, 3)));
        assert!(parse_range("-1,3").is_err());
        assert!(parse_range("0..2").is_err());
        assert!(parse_range("a,2").is_err());
    }

    #[test]
    fn array_syntax_flag_accepts_aliases() {
        assert_eq!(parse_array_syntax("c"), Ok(ArraySyntax::C));
        assert_eq!(parse_array_syntax("fortran"), Ok(ArraySyntax::Fortran));
        assert!(parse_array_syntax("pascal").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
