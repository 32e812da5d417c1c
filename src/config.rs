// ABOUTME: Configuration and constants for the Lox interpreter

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Lox Interpreter v1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking Lox interpreter in Rust";

/// Prompt shown by the interactive REPL.
pub const PROMPT: &str = "> ";

/// History persists across REPL sessions in the working directory.
pub const HISTORY_FILE: &str = ".lox_history";
