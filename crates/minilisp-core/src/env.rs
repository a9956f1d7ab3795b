use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use lasso::Spur;

use crate::value::{intern, resolve, Value};

struct Frame {
    /// Association list of `(symbol . value)` pairs, most recent binding first.
    vars: RefCell<Value>,
    parent: Option<Env>,
}

/// A minilisp environment: a chain of scopes with bindings.
///
/// The parent link is owning. It always points outward toward the root, so it
/// cannot close a cycle; closures reach back into an environment only through
/// the non-owning [`EnvRef`].
#[derive(Clone)]
pub struct Env(Rc<Frame>);

/// Non-owning handle to an [`Env`].
#[derive(Clone)]
pub struct EnvRef(Weak<Frame>);

impl Env {
    /// A root scope with no bindings.
    pub fn root() -> Self {
        Self::with_vars(Value::Nil, None)
    }

    pub fn child(parent: &Env) -> Self {
        Self::with_vars(Value::Nil, Some(parent))
    }

    pub fn with_vars(vars: Value, parent: Option<&Env>) -> Self {
        Env(Rc::new(Frame {
            vars: RefCell::new(vars),
            parent: parent.cloned(),
        }))
    }

    /// Resolve a symbol, innermost scope first. Within a scope the most
    /// recently added binding shadows earlier ones.
    pub fn lookup(&self, name: Spur) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.lookup_local(name) {
                return Some(value);
            }
            scope = env.parent();
        }
        None
    }

    pub fn lookup_str(&self, name: &str) -> Option<Value> {
        self.lookup(intern(name))
    }

    fn lookup_local(&self, name: Spur) -> Option<Value> {
        let vars = self.0.vars.borrow();
        let mut cursor = vars.as_pair().cloned();
        while let Some(cell) = cursor {
            if let Some(binding) = cell.head().as_pair() {
                if binding.head().as_symbol() == Some(name) {
                    return Some(binding.tail());
                }
            }
            cursor = cell.tail().as_pair().cloned();
        }
        None
    }

    /// Prepend a binding to this scope. Never overwrites: an earlier binding
    /// of the same name stays in the list, shadowed.
    pub fn bind(&self, name: Spur, value: Value) {
        tracing::trace!(name = %resolve(name), "bind");
        let binding = Value::cons(Value::Symbol(name), value);
        let mut vars = self.0.vars.borrow_mut();
        let rest = std::mem::take(&mut *vars);
        *vars = Value::cons(binding, rest);
    }

    pub fn bind_str(&self, name: &str, value: Value) {
        self.bind(intern(name), value);
    }

    pub fn parent(&self) -> Option<&Env> {
        self.0.parent.as_ref()
    }

    /// The bindings list of this scope only.
    pub fn vars(&self) -> Value {
        self.0.vars.borrow().clone()
    }

    /// Every name visible from this scope, innermost first, without duplicates.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut scope = Some(self);
        while let Some(env) = scope {
            for binding in env.vars().iter() {
                if let Some(name) = binding.as_pair().and_then(|b| b.head().as_symbol()) {
                    let name = resolve(name);
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            scope = env.parent();
        }
        names
    }

    pub fn downgrade(&self) -> EnvRef {
        EnvRef(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.vars().iter().count();
        f.debug_struct("Env")
            .field("bindings", &bindings)
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

impl EnvRef {
    /// The referenced environment, if something still owns it.
    pub fn upgrade(&self) -> Option<Env> {
        self.0.upgrade().map(Env)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for EnvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_alive() {
            write!(f, "EnvRef(alive)")
        } else {
            write!(f, "EnvRef(dead)")
        }
    }
}
