//! Core data model for minilisp: values, environments, errors and the
//! per-session evaluation context.

pub mod context;
pub mod env;
pub mod error;
pub mod stack;
pub mod value;

pub use context::{EvalContext, DEFAULT_MAX_EVAL_DEPTH};
pub use env::{Env, EnvRef};
pub use error::{suggest_similar, CallFrame, LispError, Span, StackTrace};
pub use lasso::Spur;
pub use stack::ensure_sufficient_stack;
pub use value::{
    intern, resolve, with_resolved, Closure, ListBuilder, ListIter, Pair, Primitive, PrimitiveFn,
    Value,
};

pub type EvalResult = Result<Value, LispError>;
