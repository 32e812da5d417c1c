// ABOUTME: Environment chain managing variable bindings and lexical scopes

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A name→value map with an optional enclosing environment.
///
/// Environments are shared (`Rc`) because many closures may capture the
/// same scope; the bindings themselves sit behind a `RefCell` so `define`
/// and `assign` work through a shared handle. A closure stored back into
/// the scope that created it forms a reference cycle, which a short-lived
/// interpreter tolerates by leaking.
#[derive(Debug)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates the global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: None,
        })
    }

    /// Creates a child environment nested inside `enclosing`.
    pub fn with_enclosing(enclosing: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(enclosing),
        })
    }

    /// Defines a binding in THIS scope (doesn't walk the chain).
    pub fn define(&self, name: String, value: Value) {
        self.values.borrow_mut().insert(name, value);
    }

    /// Looks a variable up here and then outward through the chain.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.get(name);
        }

        Err(RuntimeError::UndefinedVariable { name: name.clone() })
    }

    /// Updates an existing binding here or in an enclosing scope.
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.borrow().contains_key(&name.lexeme) {
            self.values.borrow_mut().insert(name.lexeme.clone(), value);
            return Ok(());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.assign(name, value);
        }

        Err(RuntimeError::UndefinedVariable { name: name.clone() })
    }

    /// Reads a binding exactly `distance` scopes out, without searching.
    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str) -> Option<Value> {
        self.ancestor(distance)?.values.borrow().get(name).cloned()
    }

    /// Writes a binding exactly `distance` scopes out.
    pub fn assign_at(
        self: &Rc<Self>,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match self.ancestor(distance) {
            Some(environment) => {
                environment
                    .values
                    .borrow_mut()
                    .insert(name.lexeme.clone(), value);
                Ok(())
            }
            None => Err(RuntimeError::UndefinedVariable { name: name.clone() }),
        }
    }

    fn ancestor(self: &Rc<Self>, distance: usize) -> Option<Rc<Environment>> {
        let mut environment = Rc::clone(self);
        for _ in 0..distance {
            let enclosing = environment.enclosing.clone()?;
            environment = enclosing;
        }
        Some(environment)
    }
}
