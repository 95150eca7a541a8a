//! Environment
//!
//! Lexical scope tree. Each scope owns its bindings and points at its
//! parent; lookups walk outward, writes go to the scope that already owns
//! the name (or the current scope when nobody does).
//!
//! Scopes are reference counted so closures can keep their defining scope
//! alive after the call or loop that created it returns. A function bound
//! in the scope it captured is stored with a weak capture; otherwise every
//! call that defines a named inner function would leak its scope.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::interpreter::types::{CapturedEnv, Value};

/// Pseudo-variable that yields a fresh random number on every read.
const RANDOM_VAR: &str = "RANDOM";

struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
}

/// Handle to one scope in the tree. Cloning shares the scope.
#[derive(Clone)]
pub struct Environment(Rc<Scope>);

/// Non-owning handle to a scope.
#[derive(Clone)]
pub struct WeakEnvironment(Weak<Scope>);

impl WeakEnvironment {
    pub fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(Environment)
    }

    pub(crate) fn scope_id(&self) -> *const () {
        Weak::as_ptr(&self.0) as *const ()
    }
}

impl Environment {
    /// A new root scope.
    pub fn new() -> Self {
        Environment(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// A child scope whose parent is `self`.
    pub fn extend(&self) -> Self {
        Environment(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.0.parent.as_ref()
    }

    /// The nearest scope (self or an ancestor) that binds `name`.
    pub fn lookup(&self, name: &str) -> Option<Environment> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if env.0.vars.borrow().contains_key(name) {
                return Some(env.clone());
            }
            scope = env.parent();
        }
        None
    }

    /// Resolve `name` through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.0.vars.borrow().get(name) {
                return Some(env.attach(value.clone()));
            }
            scope = env.parent();
        }
        if name == RANDOM_VAR {
            return Some(Value::Number(f64::from(rand::random::<u16>() % 32768)));
        }
        None
    }

    /// Assign to the scope that owns `name`, or define it here.
    pub fn set(&self, name: &str, value: Value) {
        match self.lookup(name) {
            Some(owner) => owner.def(name, value),
            None => self.def(name, value),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn def(&self, name: &str, value: Value) {
        let value = self.detach(value);
        self.0.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Remove the binding from the scope that owns it.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let owner = self.lookup(name)?;
        let removed = owner.0.vars.borrow_mut().remove(name);
        removed.map(|value| owner.attach(value))
    }

    /// Weaken a closure that captured this very scope before storing it.
    fn detach(&self, value: Value) -> Value {
        match value {
            Value::Function(closure)
                if matches!(closure.env, CapturedEnv::Strong(_)) && closure.captures(self) =>
            {
                let weak = CapturedEnv::Weak(self.downgrade());
                Value::Function(Rc::new(closure.with_env(weak)))
            }
            value => value,
        }
    }

    /// Undo `detach` on a value leaving this scope.
    fn attach(&self, value: Value) -> Value {
        match value {
            Value::Function(closure) if matches!(closure.env, CapturedEnv::Weak(_)) => {
                let strong = CapturedEnv::Strong(self.clone());
                Value::Function(Rc::new(closure.with_env(strong)))
            }
            value => value,
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Names bound directly in this scope, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Rc::downgrade(&self.0))
    }

    pub(crate) fn scope_id(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// Values may hold closures that point back at this scope, so only names
// are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.names())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}
