// ABOUTME: Static resolver binding variable uses to lexical scope distances

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::ErrorReporter;
use crate::interpreter::Interpreter;
use crate::token::Token;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Second pass over the AST.
///
/// Tracks a stack of scopes, each mapping a name to whether its
/// initializer has finished resolving. For every variable use it records
/// the number of scopes between the use and its binding in the
/// interpreter's side-table; names not found locally are left for the
/// global environment at evaluation time.
///
/// Static misuses are reported through the sink and never raise, so a
/// single pass surfaces every error.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    reporter: &'a mut ErrorReporter,
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter, reporter: &'a mut ErrorReporter) -> Self {
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve(statements);
                self.end_scope();
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
            Stmt::Expression { expression } => self.resolve_expr(expression),
            Stmt::Function(declaration) => {
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Print { expression } => self.resolve_expr(expression),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.reporter
                        .error_at(keyword, "Can't return from top-level code.");
                }

                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.reporter
                            .error_at(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.reporter
                        .error_at(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);

            // Methods of a subclass close over `super`.
            self.begin_scope();
            self.define_name("super");
        }

        // Every method closes over `this`.
        self.begin_scope();
        self.define_name("this");

        for method in methods {
            let declaration_type = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration_type);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl, function_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&declaration.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        match expression {
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Literal { .. } => {}
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => self
                        .reporter
                        .error_at(keyword, "Can't use 'super' outside of a class."),
                    ClassType::Class => self
                        .reporter
                        .error_at(keyword, "Can't use 'super' in a class with no superclass."),
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.reporter
                        .error_at(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword);
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.reporter
                            .error_at(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, name);
            }
        }
    }

    /// Walk the scope stack outward; the first scope containing the name
    /// determines the hop count recorded for the interpreter.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, distance);
                return;
            }
        }
        // Not found in any local scope: treated as global at evaluation time.
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Mark a name as declared but not yet usable. Redeclaring in the same
    /// local scope is a static error; global shadowing is allowed.
    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.reporter
                .error_at(name, "Already a variable with this name in this scope.");
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn define_name(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve_source(source: &str) -> (Interpreter, Vec<Stmt>, ErrorReporter) {
        let mut reporter = ErrorReporter::new();
        let tokens = Scanner::new(source, &mut reporter).scan_tokens();
        let statements = Parser::new(tokens, &mut reporter).parse();
        assert!(!reporter.had_error, "test source should parse cleanly");

        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter, &mut reporter).resolve(&statements);
        (interpreter, statements, reporter)
    }

    /// Digs the first `Variable` expression with the given lexeme out of a
    /// statement tree.
    fn find_variable(statements: &[Stmt], lexeme: &str) -> Option<ExprId> {
        fn in_stmt(statement: &Stmt, lexeme: &str) -> Option<ExprId> {
            match statement {
                Stmt::Block { statements } => {
                    statements.iter().find_map(|s| in_stmt(s, lexeme))
                }
                Stmt::Expression { expression } | Stmt::Print { expression } => {
                    in_expr(expression, lexeme)
                }
                Stmt::Function(declaration) => {
                    declaration.body.iter().find_map(|s| in_stmt(s, lexeme))
                }
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                } => in_expr(condition, lexeme)
                    .or_else(|| in_stmt(then_branch, lexeme))
                    .or_else(|| else_branch.as_ref().and_then(|s| in_stmt(s, lexeme))),
                Stmt::Return { value, .. } => value.as_ref().and_then(|v| in_expr(v, lexeme)),
                Stmt::Var { initializer, .. } => {
                    initializer.as_ref().and_then(|i| in_expr(i, lexeme))
                }
                Stmt::While { condition, body } => {
                    in_expr(condition, lexeme).or_else(|| in_stmt(body, lexeme))
                }
                Stmt::Class { .. } => None,
            }
        }

        fn in_expr(expression: &Expr, lexeme: &str) -> Option<ExprId> {
            match expression {
                Expr::Variable { id, name } if name.lexeme == lexeme => Some(*id),
                Expr::Assign { value, .. } => in_expr(value, lexeme),
                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    in_expr(left, lexeme).or_else(|| in_expr(right, lexeme))
                }
                Expr::Call {
                    callee, arguments, ..
                } => in_expr(callee, lexeme)
                    .or_else(|| arguments.iter().find_map(|a| in_expr(a, lexeme))),
                Expr::Get { object, .. } => in_expr(object, lexeme),
                Expr::Grouping { expression } => in_expr(expression, lexeme),
                Expr::Set { object, value, .. } => {
                    in_expr(object, lexeme).or_else(|| in_expr(value, lexeme))
                }
                Expr::Unary { right, .. } => in_expr(right, lexeme),
                _ => None,
            }
        }

        statements.iter().find_map(|s| in_stmt(s, lexeme))
    }

    #[test]
    fn test_local_use_gets_depth_zero() {
        let (interpreter, statements, reporter) = resolve_source("{ var a = 1; print a; }");
        assert!(!reporter.had_error);

        let id = find_variable(&statements, "a").expect("variable a is used");
        assert_eq!(interpreter.resolved_depth(id), Some(0));
    }

    #[test]
    fn test_enclosing_use_counts_scopes() {
        let (interpreter, statements, reporter) =
            resolve_source("{ var a = 1; { { print a; } } }");
        assert!(!reporter.had_error);

        let id = find_variable(&statements, "a").expect("variable a is used");
        assert_eq!(interpreter.resolved_depth(id), Some(2));
    }

    #[test]
    fn test_global_use_is_not_annotated() {
        let (interpreter, statements, reporter) = resolve_source("var a = 1; print a;");
        assert!(!reporter.had_error);

        let id = find_variable(&statements, "a").expect("variable a is used");
        assert_eq!(interpreter.resolved_depth(id), None);
    }

    #[test]
    fn test_read_in_own_initializer_is_an_error() {
        let (_, _, reporter) = resolve_source("{ var a = a; }");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_global_self_reference_is_allowed() {
        // Only local scopes enforce the initializer rule.
        let (_, _, reporter) = resolve_source("var a = 1; var b = b;");
        assert!(!reporter.had_error);
    }

    #[test]
    fn test_duplicate_local_declaration_is_an_error() {
        let (_, _, reporter) = resolve_source("{ var a = 1; var a = 2; }");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        let (_, _, reporter) = resolve_source("var a = 1; var a = 2;");
        assert!(!reporter.had_error);
    }

    #[test]
    fn test_return_at_top_level_is_an_error() {
        let (_, _, reporter) = resolve_source("return 1;");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_return_value_in_initializer_is_an_error() {
        let (_, _, reporter) = resolve_source("class A { init() { return 1; } }");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_bare_return_in_initializer_is_allowed() {
        let (_, _, reporter) = resolve_source("class A { init() { return; } }");
        assert!(!reporter.had_error);
    }

    #[test]
    fn test_this_outside_class_is_an_error() {
        let (_, _, reporter) = resolve_source("print this;");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_this_in_method_resolves() {
        let (_, _, reporter) = resolve_source("class A { show() { print this; } }");
        assert!(!reporter.had_error);
    }

    #[test]
    fn test_super_outside_class_is_an_error() {
        let (_, _, reporter) = resolve_source("fun f() { super.go(); }");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_super_without_superclass_is_an_error() {
        let (_, _, reporter) = resolve_source("class A { go() { super.go(); } }");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_super_in_subclass_is_allowed() {
        let (_, _, reporter) =
            resolve_source("class A { go() {} } class B < A { go() { super.go(); } }");
        assert!(!reporter.had_error);
    }

    #[test]
    fn test_class_inheriting_itself_is_an_error() {
        let (_, _, reporter) = resolve_source("class A < A {}");
        assert!(reporter.had_error);
    }

    #[test]
    fn test_closure_captures_enclosing_function_scope() {
        let source = "fun outer() { var i = 0; fun inner() { print i; } }";
        let (interpreter, statements, reporter) = resolve_source(source);
        assert!(!reporter.had_error);

        // `i` inside `inner` sits one scope out: inner's body scope, then
        // outer's body scope where `i` lives.
        let id = find_variable(&statements, "i").expect("variable i is used");
        assert_eq!(interpreter.resolved_depth(id), Some(1));
    }
}
