// ABOUTME: Tree-walking evaluator executing resolved statements

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::env::Environment;
use crate::error::{ErrorReporter, RuntimeError, Unwind};
use crate::natives;
use crate::token::{Literal, Token, TokenKind};
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

/// Walks statements in order, carrying the active environment and the
/// resolver's depth side-table. One interpreter serves a whole REPL
/// session, so globals and resolved depths accumulate across lines.
pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter that prints through the given sink instead of
    /// stdout. Tests use this to capture program output.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Environment::new();
        natives::register_natives(&globals);
        Interpreter {
            globals: globals.clone(),
            environment: globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a scope distance for a variable-referencing expression.
    /// Called by the resolver.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub(crate) fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Execute a program. A runtime error stops execution and is reported
    /// with the offending token's line.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut ErrorReporter) {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Unwind::Error(error)) => {
                    reporter.runtime_error(&error);
                    return;
                }
                // The resolver rejects top-level returns, so an unwound
                // return can only mean evaluation already stopped.
                Err(Unwind::Return(_)) => return,
            }
        }
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Unwind> {
        match statement {
            Stmt::Block { statements } => {
                let environment = Environment::with_enclosing(self.environment.clone());
                self.execute_block(statements, environment)
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(())
            }
            Stmt::Function(declaration) => {
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);
                self.environment.define(
                    declaration.name.lexeme.clone(),
                    Value::Function(Rc::new(function)),
                );
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                // A closed output stream is not a script error.
                writeln!(self.output, "{}", value).ok();
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Nil,
                };
                Err(Unwind::Return(value))
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
        }
    }

    /// Run statements with the given environment active, restoring the
    /// previous one on every exit path including unwinds.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<Environment>,
    ) -> Result<(), Unwind> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Unwind> {
        let superclass = match superclass_expr {
            Some(expression) => match self.evaluate(expression)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(RuntimeError::SuperclassNotClass {
                        name: superclass_token(expression, name),
                    }
                    .into());
                }
            },
            None => None,
        };

        self.environment.define(name.lexeme.clone(), Value::Nil);

        // Methods of a subclass close over an environment binding `super`.
        let previous = superclass.as_ref().map(|superclass| {
            let environment = Environment::with_enclosing(self.environment.clone());
            environment.define("super".to_string(), Value::Class(superclass.clone()));
            std::mem::replace(&mut self.environment, environment)
        });

        let mut method_map = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function =
                LoxFunction::new(method.clone(), self.environment.clone(), is_initializer);
            method_map.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass, method_map);

        if let Some(previous) = previous {
            self.environment = previous;
        }

        self.environment.assign(name, Value::Class(Rc::new(class)))?;
        Ok(())
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Value, Unwind> {
        match expression {
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        self.environment.assign_at(distance, name, value.clone())?;
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(left, operator, right).map_err(Unwind::from)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee, args, paren)
            }
            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),
                _ => Err(RuntimeError::PropertyOnNonInstance { name: name.clone() }.into()),
            },
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Literal { value } => Ok(literal_value(value)),
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // Short-circuit yields the deciding operand, not a boolean.
                if operator.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }

                self.evaluate(right)
            }
            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::FieldOnNonInstance { name: name.clone() }.into()),
            },
            Expr::Super { id, keyword, method } => {
                let distance = match self.locals.get(id) {
                    Some(&distance) => distance,
                    None => {
                        return Err(
                            RuntimeError::UndefinedVariable { name: keyword.clone() }.into()
                        );
                    }
                };

                let superclass = match self.environment.get_at(distance, "super") {
                    Some(Value::Class(class)) => class,
                    _ => {
                        return Err(
                            RuntimeError::UndefinedVariable { name: keyword.clone() }.into()
                        );
                    }
                };

                // `this` always lives one scope inside the `super` scope.
                let object = match self.environment.get_at(distance - 1, "this") {
                    Some(value) => value,
                    None => {
                        return Err(
                            RuntimeError::UndefinedVariable { name: keyword.clone() }.into()
                        );
                    }
                };

                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(object)))),
                    None => Err(RuntimeError::UndefinedProperty {
                        name: method.clone(),
                    }
                    .into()),
                }
            }
            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::NumberOperand {
                            operator: operator.clone(),
                        }
                        .into()),
                    },
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("unary operator {:?}", operator.kind),
                }
            }
            Expr::Variable { id, name } => self.lookup_variable(*id, name),
        }
    }

    /// Resolved expressions hop exactly `distance` scopes; everything else
    /// falls back to the global environment.
    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value, Unwind> {
        match self.locals.get(&id) {
            Some(&distance) => self
                .environment
                .get_at(distance, &name.lexeme)
                .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() }.into()),
            None => Ok(self.globals.get(name)?),
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Unwind> {
        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;
                function.call(self, arguments)
            }
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren)?;
                (native.function)(&arguments).map_err(|message| {
                    RuntimeError::Native {
                        paren: paren.clone(),
                        message,
                    }
                    .into()
                })
            }
            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                let instance =
                    Value::Instance(Rc::new(RefCell::new(LoxInstance::new(class.clone()))));
                if let Some(initializer) = class.find_method("init") {
                    initializer.bind(instance.clone()).call(self, arguments)?;
                }
                Ok(instance)
            }
            _ => Err(RuntimeError::NotCallable {
                paren: paren.clone(),
            }
            .into()),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<(), Unwind> {
    if expected == got {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            paren: paren.clone(),
            expected,
            got,
        }
        .into())
    }
}

fn binary_op(left: Value, operator: &Token, right: Value) -> Result<Value, RuntimeError> {
    match operator.kind {
        // `+` is the one operator that also concatenates strings.
        TokenKind::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            _ => Err(RuntimeError::AddOperands {
                operator: operator.clone(),
            }),
        },
        TokenKind::Minus => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a - b))
        }
        TokenKind::Star => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a * b))
        }
        // IEEE-754 semantics: a zero divisor yields inf or NaN, no error.
        TokenKind::Slash => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a / b))
        }
        TokenKind::Percent => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a % b))
        }
        TokenKind::Greater => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a > b))
        }
        TokenKind::GreaterEqual => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a >= b))
        }
        TokenKind::Less => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a < b))
        }
        TokenKind::LessEqual => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a <= b))
        }
        // Equality never raises; it falls back to value identity rules.
        TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
        TokenKind::BangEqual => Ok(Value::Bool(left != right)),
        _ => unreachable!("binary operator {:?}", operator.kind),
    }
}

fn number_operands(
    operator: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(RuntimeError::NumberOperands {
            operator: operator.clone(),
        }),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Nil => Value::Nil,
    }
}

fn superclass_token(expression: &Expr, class_name: &Token) -> Token {
    match expression {
        Expr::Variable { name, .. } => name.clone(),
        _ => class_name.clone(),
    }
}
