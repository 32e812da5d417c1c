// ABOUTME: CLI entry point for script execution and the interactive REPL

mod config;
mod highlighter;

use clap::Parser;
use config::{HISTORY_FILE, PROMPT, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use highlighter::LoxHelper;
use lox::error::ErrorReporter;
use lox::interpreter::Interpreter;
use lox::run;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Lox interpreter: runs a script file, or starts a REPL with no arguments
#[derive(Parser, Debug)]
#[command(name = "lox")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking interpreter for the Lox language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    ///
    /// Collected as a list so that surplus arguments reach our own usage
    /// check instead of clap's.
    #[arg(value_name = "SCRIPT")]
    script: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.script.len() {
        0 => run_prompt(),
        1 => run_file(&args.script[0]),
        _ => {
            println!("Too many arguments");
            ExitCode::from(64)
        }
    }
}

/// Script mode: run the file once; exit 65 on static errors, 70 on a
/// runtime error.
fn run_file(path: &Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Cannot read script file {}: {}", path.display(), error);
            return ExitCode::from(64);
        }
    };

    let mut interpreter = Interpreter::new();
    let mut reporter = ErrorReporter::new();
    run(&source, &mut interpreter, &mut reporter);

    if reporter.had_error {
        return ExitCode::from(65);
    }
    if reporter.had_runtime_error {
        return ExitCode::from(70);
    }
    ExitCode::SUCCESS
}

/// Interactive mode: one interpreter for the whole session, so globals and
/// definitions carry across lines. Static errors are cleared per line.
fn run_prompt() -> ExitCode {
    let mut interpreter = Interpreter::new();
    let mut reporter = ErrorReporter::new();

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<LoxHelper, DefaultHistory> = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("Failed to initialize REPL: {}", error);
            return ExitCode::FAILURE;
        }
    };

    rl.set_helper(Some(LoxHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                run(&line, &mut interpreter, &mut reporter);
                reporter.reset();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C clears the line and keeps the session alive.
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(error) => {
                eprintln!("Error: {}", error);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}
