// ABOUTME: Error sink shared by the pipeline plus the runtime failure types

use crate::token::{Token, TokenKind};
use crate::value::Value;
use thiserror::Error;

/// Collects errors across the scan/parse/resolve/evaluate pipeline.
///
/// One reporter serves an entire run; the REPL constructs a single reporter
/// for the session and clears `had_error` between lines (runtime failures
/// stay sticky, matching file-mode exit semantics).
#[derive(Debug, Default)]
pub struct ErrorReporter {
    pub had_error: bool,
    pub had_runtime_error: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a scanner error. Scanner errors carry only a line.
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report a parser or resolver error at the offending token.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.kind == TokenKind::Eof {
            self.report(token.line, " at end", message);
        } else {
            let location = format!(" at '{}'", token.lexeme);
            self.report(token.line, &location, message);
        }
    }

    /// Report a runtime error that unwound out of evaluation.
    pub fn runtime_error(&mut self, error: &RuntimeError) {
        eprintln!("{}\n[line {}]", error, error.token().line);
        self.had_runtime_error = true;
    }

    /// Clear the static-error flag. Called by the REPL between lines.
    pub fn reset(&mut self) {
        self.had_error = false;
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        eprintln!("[line {}] Error{}: {}", line, location, message);
        self.had_error = true;
    }
}

/// A typed runtime failure. Every variant carries the token used for line
/// reporting; `Display` is exactly the user-visible message.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Operand must be a number.")]
    NumberOperand { operator: Token },

    #[error("Operands must be numbers.")]
    NumberOperands { operator: Token },

    #[error("Operands must be two numbers or two strings.")]
    AddOperands { operator: Token },

    #[error("Undefined variable '{}'.", .name.lexeme)]
    UndefinedVariable { name: Token },

    #[error("Undefined property '{}'.", .name.lexeme)]
    UndefinedProperty { name: Token },

    #[error("Only instances have properties.")]
    PropertyOnNonInstance { name: Token },

    #[error("Only instances have fields.")]
    FieldOnNonInstance { name: Token },

    #[error("Can only call functions and classes.")]
    NotCallable { paren: Token },

    #[error("Expected {expected} arguments got {got}.")]
    ArityMismatch {
        paren: Token,
        expected: usize,
        got: usize,
    },

    #[error("Superclass must be a class.")]
    SuperclassNotClass { name: Token },

    #[error("{message}")]
    Native { paren: Token, message: String },
}

impl RuntimeError {
    /// The token whose line locates this failure in the source.
    pub fn token(&self) -> &Token {
        match self {
            RuntimeError::NumberOperand { operator }
            | RuntimeError::NumberOperands { operator }
            | RuntimeError::AddOperands { operator } => operator,
            RuntimeError::UndefinedVariable { name }
            | RuntimeError::UndefinedProperty { name }
            | RuntimeError::PropertyOnNonInstance { name }
            | RuntimeError::FieldOnNonInstance { name }
            | RuntimeError::SuperclassNotClass { name } => name,
            RuntimeError::NotCallable { paren }
            | RuntimeError::ArityMismatch { paren, .. }
            | RuntimeError::Native { paren, .. } => paren,
        }
    }
}

/// Control flow unwinding out of evaluation.
///
/// `Return` is not an error: it carries a value up to the nearest function
/// call frame, which inspects and resets it. Only `Error` ever reaches the
/// top-level interpreter loop.
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(RuntimeError),
    Return(Value),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}
