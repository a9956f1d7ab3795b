use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lasso::{Rodeo, Spur};

use crate::context::EvalContext;
use crate::env::{Env, EnvRef};
use crate::error::LispError;

thread_local! {
    static INTERNER: RefCell<Rodeo> = RefCell::new(Rodeo::default());
}

/// Intern a string, returning a Spur key.
pub fn intern(s: &str) -> Spur {
    INTERNER.with(|r| r.borrow_mut().get_or_intern(s))
}

/// Resolve a Spur key back to a String.
pub fn resolve(spur: Spur) -> String {
    INTERNER.with(|r| r.borrow().resolve(&spur).to_string())
}

/// Resolve a Spur and call f with the &str, avoiding allocation.
pub fn with_resolved<F, R>(spur: Spur, f: F) -> R
where
    F: FnOnce(&str) -> R,
{
    INTERNER.with(|r| {
        let interner = r.borrow();
        f(interner.resolve(&spur))
    })
}

/// A built-in operation. It receives the caller's environment and the raw,
/// unevaluated argument list, and decides itself what to evaluate.
pub type PrimitiveFn = fn(&EvalContext, &Env, &Value) -> Result<Value, LispError>;

#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFn,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<primitive {}>", self.name)
    }
}

/// A user-defined function.
///
/// `params` and `body` are owned lists. `env` is a non-owning handle to the
/// defining environment: a closure bound inside the environment it captured
/// must not keep that environment alive, or neither would ever be freed.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Value,
    pub body: Value,
    pub env: EnvRef,
    pub name: Option<Spur>,
}

/// A list cell. Owns both its head and its tail.
///
/// The tail is only ever replaced while a list is being built by
/// [`ListBuilder`]; a finished list is never mutated.
pub struct Pair {
    head: Value,
    tail: RefCell<Value>,
}

impl Pair {
    pub fn new(head: Value, tail: Value) -> Self {
        Pair {
            head,
            tail: RefCell::new(tail),
        }
    }

    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn tail(&self) -> Value {
        self.tail.borrow().clone()
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pair(")?;
        write_value(f, &self.head)?;
        f.write_str(" . ")?;
        write_value(f, &self.tail.borrow())?;
        f.write_str(")")
    }
}

impl Drop for Pair {
    // Tear down uniquely owned cells from a worklist so neither long nor deeply
    // nested lists recurse once per cell.
    fn drop(&mut self) {
        let head = std::mem::take(&mut self.head);
        let tail = self.tail.take();
        if !matches!(head, Value::Pair(_)) && !matches!(tail, Value::Pair(_)) {
            return;
        }
        let mut pending = vec![head, tail];
        while let Some(value) = pending.pop() {
            if let Value::Pair(cell) = value {
                if let Ok(mut pair) = Rc::try_unwrap(cell) {
                    pending.push(std::mem::take(&mut pair.head));
                    pending.push(pair.tail.take());
                }
            }
        }
    }
}

/// Incremental construction of a proper list with O(1) append.
///
/// `last` caches the terminal Pair of the list under construction; each push
/// replaces that Pair's Nil tail with a new Pair and advances the cache.
/// [`ListBuilder::finish`] hands out the list and discards the cache.
#[derive(Debug, Default)]
pub struct ListBuilder {
    head: Value,
    last: Option<Rc<Pair>>,
}

impl ListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        let cell = Rc::new(Pair::new(value, Value::Nil));
        match &self.last {
            None => self.head = Value::Pair(Rc::clone(&cell)),
            Some(last) => {
                let mut tail = last.tail.borrow_mut();
                debug_assert!(tail.is_nil(), "terminal cell of an open list must end in nil");
                *tail = Value::Pair(Rc::clone(&cell));
            }
        }
        self.last = Some(cell);
    }

    pub fn finish(self) -> Value {
        self.head
    }
}

impl Extend<Value> for ListBuilder {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<Value> for ListBuilder {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut builder = ListBuilder::new();
        builder.extend(iter);
        builder
    }
}

/// Iterator over the elements of a list. Stops at the first non-Pair tail;
/// use [`Value::to_vec`] when an improper tail must be reported.
pub struct ListIter {
    next: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match std::mem::take(&mut self.next) {
            Value::Pair(cell) => {
                self.next = cell.tail();
                Some(cell.head.clone())
            }
            _ => None,
        }
    }
}

/// The runtime datum for all minilisp data.
///
/// Cloning is `retain` and dropping is `release`: every heap-backed variant is
/// reference counted, and teardown of a value releases what it owns.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    True,
    Int(i64),
    String(Rc<str>),
    Symbol(Spur),
    Pair(Rc<Pair>),
    Environment(Env),
    Primitive(Primitive),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::True => "true",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Environment(_) => "environment",
            Value::Primitive(_) => "primitive",
            Value::Closure(_) => "closure",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_nil()
    }

    pub fn bool(b: bool) -> Value {
        if b {
            Value::True
        } else {
            Value::Nil
        }
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn symbol(s: &str) -> Value {
        Value::Symbol(intern(s))
    }

    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Pair::new(head, tail)))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        items.into_iter().collect::<ListBuilder>().finish()
    }

    pub fn primitive(name: &'static str, func: PrimitiveFn) -> Value {
        Value::Primitive(Primitive { name, func })
    }

    pub fn closure(closure: Closure) -> Value {
        Value::Closure(Rc::new(closure))
    }

    pub fn environment(env: Env) -> Value {
        Value::Environment(env)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Spur> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    /// A list is empty iff it is Nil.
    pub fn is_empty(&self) -> bool {
        self.is_nil()
    }

    pub fn iter(&self) -> ListIter {
        ListIter { next: self.clone() }
    }

    /// Number of Pairs walked before reaching Nil.
    pub fn length(&self) -> Result<usize, LispError> {
        let mut count = 0;
        let mut cursor = self.clone();
        loop {
            match cursor {
                Value::Nil => return Ok(count),
                Value::Pair(cell) => {
                    count += 1;
                    cursor = cell.tail();
                }
                other => {
                    return Err(LispError::malformed(format!(
                        "list ends in {} instead of ()",
                        other.type_name()
                    )))
                }
            }
        }
    }

    /// Collect the elements of a proper list.
    pub fn to_vec(&self) -> Result<Vec<Value>, LispError> {
        let mut items = Vec::new();
        let mut cursor = self.clone();
        loop {
            match cursor {
                Value::Nil => return Ok(items),
                Value::Pair(cell) => {
                    items.push(cell.head.clone());
                    cursor = cell.tail();
                }
                other => {
                    return Err(LispError::malformed(format!(
                        "list ends in {} instead of ()",
                        other.type_name()
                    )))
                }
            }
        }
    }

    pub fn reverse(&self) -> Result<Value, LispError> {
        let mut reversed = Value::Nil;
        for item in self.to_vec()? {
            reversed = Value::cons(item, reversed);
        }
        Ok(reversed)
    }

    /// Strong reference count of a heap-backed value; `None` for immediates.
    pub fn ref_count(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(Rc::strong_count(s)),
            Value::Pair(p) => Some(Rc::strong_count(p)),
            Value::Closure(c) => Some(Rc::strong_count(c)),
            Value::Environment(env) => Some(env.ref_count()),
            Value::Nil
            | Value::True
            | Value::Int(_)
            | Value::Symbol(_)
            | Value::Primitive(_) => None,
        }
    }
}

// Structural equality over data; environments and closures compare by identity.
// Walks both values from a worklist, so nesting depth costs heap, not stack.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((a, b)) = pending.pop() {
            let same = match (&a, &b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if !Rc::ptr_eq(x, y) {
                        pending.push((x.tail(), y.tail()));
                        pending.push((x.head.clone(), y.head.clone()));
                    }
                    true
                }
                (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
                (Value::Int(x), Value::Int(y)) => x == y,
                (Value::String(x), Value::String(y)) => x == y,
                (Value::Symbol(x), Value::Symbol(y)) => x == y,
                (Value::Environment(x), Value::Environment(y)) => x.ptr_eq(y),
                (Value::Primitive(x), Value::Primitive(y)) => x.name == y.name,
                (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

/// Pending output of the printer.
enum Piece {
    Value(Value),
    /// The rest of a list whose opening paren is already written.
    Tail(Value),
    Close,
}

fn write_value(out: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    let mut pending = vec![Piece::Value(value.clone())];
    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Value(Value::Pair(cell)) => {
                out.write_char('(')?;
                pending.push(Piece::Tail(cell.tail()));
                pending.push(Piece::Value(cell.head.clone()));
            }
            Piece::Value(atom) => write_atom(out, &atom)?,
            Piece::Tail(Value::Nil) | Piece::Close => out.write_char(')')?,
            Piece::Tail(Value::Pair(cell)) => {
                out.write_char(' ')?;
                pending.push(Piece::Tail(cell.tail()));
                pending.push(Piece::Value(cell.head.clone()));
            }
            Piece::Tail(improper) => {
                out.write_str(" . ")?;
                pending.push(Piece::Close);
                pending.push(Piece::Value(improper));
            }
        }
    }
    Ok(())
}

fn write_atom(out: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::Nil => out.write_str("()"),
        Value::True => out.write_str("true"),
        Value::Int(n) => write!(out, "{n}"),
        Value::String(s) => {
            out.write_char('"')?;
            for ch in s.chars() {
                if ch == '"' || ch == '\\' {
                    out.write_char('\\')?;
                }
                out.write_char(ch)?;
            }
            out.write_char('"')
        }
        Value::Symbol(s) => with_resolved(*s, |name| out.write_str(name)),
        Value::Pair(_) => write_value(out, value),
        Value::Environment(_) => out.write_str("<environment>"),
        Value::Primitive(p) => write!(out, "<primitive {}>", p.name),
        Value::Closure(c) => match c.name {
            Some(name) => with_resolved(name, |n| write!(out, "<closure {n}>")),
            None => out.write_str("<closure>"),
        },
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self)
    }
}

/// Collects at most `limit` characters, then refuses further output.
struct Bounded {
    text: String,
    chars: usize,
    limit: usize,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.chars == self.limit {
                return Err(fmt::Error);
            }
            self.text.push(ch);
            self.chars += 1;
        }
        Ok(())
    }
}

impl Value {
    /// The printed form cut to `max_chars` characters, ending in `…` when cut.
    /// Printing stops at the limit, so a huge value costs no more than a small one.
    pub fn to_string_truncated(&self, max_chars: usize) -> String {
        let mut out = Bounded {
            text: String::new(),
            chars: 0,
            limit: max_chars + 1,
        };
        if write_value(&mut out, self).is_ok() {
            return out.text;
        }
        let mut text: String = out.text.chars().take(max_chars.saturating_sub(1)).collect();
        text.push('…');
        text
    }
}
