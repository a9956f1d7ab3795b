//! Tree-walking evaluator for minilisp.
//!
//! Every callable receives its argument list unevaluated; primitives decide
//! what to evaluate, which is how `if`, `let` and `quote` work without a
//! separate macro layer.

mod arithmetic;
mod comparison;
mod eval;
pub mod prelude;
mod special_forms;

pub use eval::{apply, eval, eval_list, eval_sequence, eval_string, Interpreter};
pub use prelude::{root_env, BUILTIN_NAMES};
