// ABOUTME: Prefix printer rendering expression trees as parenthesized text

use crate::ast::Expr;
use crate::token::Literal;

/// Renders an expression as a fully parenthesized prefix form, e.g.
/// `(* (- 123) (group 456))`. Structurally equal trees always render to
/// the same string, which makes the output handy in tests and diagnostics.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            Expr::Assign { name, value, .. } => {
                parenthesize("=", &[name.lexeme.clone(), Self::print(value)])
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => parenthesize(&operator.lexeme, &[Self::print(left), Self::print(right)]),
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts = vec![Self::print(callee)];
                parts.extend(arguments.iter().map(Self::print));
                parenthesize("call", &parts)
            }
            Expr::Get { object, name } => {
                parenthesize(".", &[Self::print(object), name.lexeme.clone()])
            }
            Expr::Grouping { expression } => parenthesize("group", &[Self::print(expression)]),
            Expr::Literal { value } => literal_text(value),
            Expr::Logical {
                left,
                operator,
                right,
            } => parenthesize(&operator.lexeme, &[Self::print(left), Self::print(right)]),
            Expr::Set {
                object,
                name,
                value,
            } => parenthesize(
                "=",
                &[Self::print(object), name.lexeme.clone(), Self::print(value)],
            ),
            Expr::Super { method, .. } => parenthesize("super", &[method.lexeme.clone()]),
            Expr::This { .. } => "this".to_string(),
            Expr::Unary { operator, right } => {
                parenthesize(&operator.lexeme, &[Self::print(right)])
            }
            Expr::Variable { name, .. } => name.lexeme.clone(),
        }
    }
}

fn parenthesize(name: &str, parts: &[String]) -> String {
    let mut builder = String::from("(");
    builder.push_str(name);
    for part in parts {
        builder.push(' ');
        builder.push_str(part);
    }
    builder.push(')');
    builder
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Literal::Str(s) => s.clone(),
        Literal::Bool(b) => b.to_string(),
        Literal::Nil => "nil".to_string(),
    }
}
