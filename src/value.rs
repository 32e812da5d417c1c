// ABOUTME: Runtime value types, callables, classes, and instances

use crate::ast::FunctionDecl;
use crate::env::Environment;
use crate::error::{RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::token::Token;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A dynamically-typed Lox value.
///
/// Primitives compare by value; functions, natives, classes, and instances
/// compare by identity.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Value {
    /// `nil` and `false` are falsey; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                // Integral values display without a trailing decimal part.
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Function(function) => {
                write!(f, "<fn {}>", function.declaration.name.lexeme)
            }
            Value::Native(native) => write!(f, "<native {} fn>", native.name),
            Value::Class(class) => write!(f, "<{} class>", class.name),
            Value::Instance(instance) => {
                write!(f, "<{} instance>", instance.borrow().class.name)
            }
        }
    }
}

/// A user-defined function: shared declaration, captured environment, and
/// an initializer flag that forces `init` to return its bound `this`.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<Environment>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<Environment>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Returns a copy of this function whose closure nests the original
    /// and binds `this` to the given instance.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        let environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this".to_string(), instance);
        LoxFunction {
            declaration: self.declaration.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    /// Runs the body in a fresh environment nested in the closure. A
    /// `Return` unwind stops here; initializers always yield their `this`.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        let environment = Environment::with_enclosing(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme.clone(), argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => {}
            Err(Unwind::Return(value)) => {
                if !self.is_initializer {
                    return Ok(value);
                }
            }
            Err(unwind) => return Err(unwind),
        }

        if self.is_initializer {
            // bind() always defines `this` at distance zero.
            Ok(self.closure.get_at(0, "this").unwrap_or(Value::Nil))
        } else {
            Ok(Value::Nil)
        }
    }
}

/// A class: a named method table with an optional superclass.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    /// Searches own methods first, then walks the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Calling a class takes as many arguments as its `init` method.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map_or(0, |initializer| initializer.arity())
    }
}

/// An instance: a class pointer plus fields created on assignment.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Property lookup: own fields shadow methods; a found method comes
    /// back bound to this instance.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = instance.borrow().class.find_method(&name.lexeme);
        if let Some(method) = method {
            let bound = method.bind(Value::Instance(instance.clone()));
            return Ok(Value::Function(Rc::new(bound)));
        }

        Err(RuntimeError::UndefinedProperty { name: name.clone() })
    }

    /// Fields are created on assignment; no declaration step exists.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

/// A host function exposed to Lox programs. The error string gets attached
/// to the call's closing paren token by the evaluator.
#[derive(Debug)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: fn(&[Value]) -> Result<Value, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn ident(lexeme: &str) -> Token {
        Token::new(TokenKind::Identifier, lexeme, None, 1)
    }

    fn function_named(name: &str) -> Rc<LoxFunction> {
        let declaration = Rc::new(FunctionDecl {
            name: ident(name),
            params: vec![],
            body: vec![],
        });
        Rc::new(LoxFunction::new(declaration, Environment::new(), false))
    }

    #[test]
    fn test_number_display() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(-2.5)), "-2.5");
        assert_eq!(format!("{}", Value::Number(0.0)), "0");
        assert_eq!(format!("{}", Value::Number(7.0)), "7");
    }

    #[test]
    fn test_primitive_display() {
        assert_eq!(format!("{}", Value::Nil), "nil");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Bool(false)), "false");
        assert_eq!(format!("{}", Value::Str("hi".to_string())), "hi");
    }

    #[test]
    fn test_callable_display() {
        let function = function_named("greet");
        assert_eq!(format!("{}", Value::Function(function)), "<fn greet>");

        let class = Rc::new(LoxClass::new("Point".to_string(), None, HashMap::new()));
        assert_eq!(format!("{}", Value::Class(class.clone())), "<Point class>");

        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        assert_eq!(format!("{}", Value::Instance(instance)), "<Point instance>");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn test_primitive_equality() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_eq!(Value::Str("a".to_string()), Value::Str("a".to_string()));
        assert_ne!(Value::Number(1.0), Value::Str("1".to_string()));
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn test_heap_values_compare_by_identity() {
        let a = function_named("same");
        let b = function_named("same");
        assert_eq!(Value::Function(a.clone()), Value::Function(a.clone()));
        assert_ne!(Value::Function(a), Value::Function(b));
    }

    #[test]
    fn test_find_method_walks_superclass_chain() {
        let mut base_methods = HashMap::new();
        base_methods.insert("speak".to_string(), function_named("speak"));
        let base = Rc::new(LoxClass::new("Base".to_string(), None, base_methods));

        let derived = Rc::new(LoxClass::new(
            "Derived".to_string(),
            Some(base),
            HashMap::new(),
        ));

        assert!(derived.find_method("speak").is_some());
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn test_class_arity_follows_init() {
        let declaration = Rc::new(FunctionDecl {
            name: ident("init"),
            params: vec![ident("a"), ident("b")],
            body: vec![],
        });
        let init = Rc::new(LoxFunction::new(declaration, Environment::new(), true));

        let mut methods = HashMap::new();
        methods.insert("init".to_string(), init);
        let class = LoxClass::new("Pair".to_string(), None, methods);
        assert_eq!(class.arity(), 2);

        let bare = LoxClass::new("Bare".to_string(), None, HashMap::new());
        assert_eq!(bare.arity(), 0);
    }

    #[test]
    fn test_bind_defines_this() {
        let class = Rc::new(LoxClass::new("Thing".to_string(), None, HashMap::new()));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        let method = function_named("method");

        let bound = method.bind(Value::Instance(instance.clone()));
        match bound.closure.get_at(0, "this") {
            Some(Value::Instance(found)) => assert!(Rc::ptr_eq(&found, &instance)),
            other => panic!("Expected bound this, got {:?}", other),
        }
    }

    #[test]
    fn test_field_shadows_method() {
        let mut methods = HashMap::new();
        methods.insert("x".to_string(), function_named("x"));
        let class = Rc::new(LoxClass::new("Holder".to_string(), None, methods));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));

        instance.borrow_mut().set(&ident("x"), Value::Number(5.0));
        match LoxInstance::get(&instance, &ident("x")) {
            Ok(Value::Number(n)) => assert_eq!(n, 5.0),
            other => panic!("Expected the field value, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_property_is_an_error() {
        let class = Rc::new(LoxClass::new("Empty".to_string(), None, HashMap::new()));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        assert!(LoxInstance::get(&instance, &ident("nothing")).is_err());
    }
}
