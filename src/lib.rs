// ABOUTME: Library module exposing internal components for testing

pub mod ast;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod natives;
pub mod parser;
pub mod printer;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use error::ErrorReporter;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Run one source unit through the full pipeline: scan, parse, resolve,
/// evaluate. Static errors stop the pipeline before evaluation; the
/// reporter's flags tell the caller what happened.
pub fn run(source: &str, interpreter: &mut Interpreter, reporter: &mut ErrorReporter) {
    let tokens = Scanner::new(source, reporter).scan_tokens();
    let statements = Parser::new(tokens, reporter).parse();

    if reporter.had_error {
        return;
    }

    Resolver::new(interpreter, reporter).resolve(&statements);
    if reporter.had_error {
        return;
    }

    interpreter.interpret(&statements, reporter);
}
