// ABOUTME: Native functions pre-bound in the global environment

use crate::env::Environment;
use crate::value::{NativeFunction, Value};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Register every native in the given (global) environment.
pub fn register_natives(globals: &Rc<Environment>) {
    define_native(globals, "clock", 0, native_clock);
    define_native(globals, "input", 0, native_input);
    define_native(globals, "length", 1, native_length);
}

fn define_native(
    globals: &Rc<Environment>,
    name: &'static str,
    arity: usize,
    function: fn(&[Value]) -> Result<Value, String>,
) {
    globals.define(
        name.to_string(),
        Value::Native(Rc::new(NativeFunction {
            name,
            arity,
            function,
        })),
    );
}

/// `clock()` — seconds since the Unix epoch as a Lox number.
fn native_clock(_args: &[Value]) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|error| error.to_string())?;
    Ok(Value::Number(now.as_secs_f64()))
}

/// `input()` — reads one line from stdin, trailing newline stripped.
fn native_input(_args: &[Value]) -> Result<Value, String> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|error| error.to_string())?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::Str(line))
}

/// `length(s)` — character count of a string.
fn native_length(args: &[Value]) -> Result<Value, String> {
    match args.first() {
        Some(Value::Str(s)) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err("Expect string argument.".to_string()),
    }
}
