//! The root environment every session starts from.

use minilisp_core::{Env, PrimitiveFn, Value};

use crate::{arithmetic, comparison, special_forms};

/// Names bound by [`root_env`] besides `argv`, in registration order.
pub const BUILTIN_NAMES: &[&str] = &[
    "nil", "true", "false", "do", "if", "let", "define", "defun", "lambda", "quote", "eval",
    "read", "print", "+", "-", "*", "/", "=", "<", ">", "<=", ">=",
];

pub(crate) fn register_fn(env: &Env, name: &'static str, func: PrimitiveFn) {
    env.bind_str(name, Value::primitive(name, func));
}

/// Build a fresh root environment: constants, the primitive library, and
/// `argv` as a list of strings.
pub fn root_env(args: &[String]) -> Env {
    let env = Env::root();
    env.bind_str("nil", Value::Nil);
    env.bind_str("true", Value::True);
    env.bind_str("false", Value::Nil);

    special_forms::register(&env);
    arithmetic::register(&env);
    comparison::register(&env);

    env.bind_str(
        "argv",
        Value::list(args.iter().map(|arg| Value::string(arg))),
    );
    tracing::debug!(args = args.len(), "root environment created");
    env
}
