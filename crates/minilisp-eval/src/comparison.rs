use minilisp_core::{check_arity, Env, EvalContext, EvalResult, LispError, Value};

use crate::eval;
use crate::prelude::register_fn;

pub fn register(env: &Env) {
    register_fn(env, "=", num_eq);
    register_fn(env, "<", lt);
    register_fn(env, ">", gt);
    register_fn(env, "<=", le);
    register_fn(env, ">=", ge);
}

fn num_eq(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    compare(ctx, env, args, "=", |a, b| a == b)
}

fn lt(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    compare(ctx, env, args, "<", |a, b| a < b)
}

fn gt(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    compare(ctx, env, args, ">", |a, b| a > b)
}

fn le(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    compare(ctx, env, args, "<=", |a, b| a <= b)
}

fn ge(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    compare(ctx, env, args, ">=", |a, b| a >= b)
}

/// Both operands must be integers; the result is True or Nil.
fn compare(
    ctx: &EvalContext,
    env: &Env,
    args: &Value,
    name: &'static str,
    op: fn(i64, i64) -> bool,
) -> EvalResult {
    let exprs = args.to_vec()?;
    check_arity!(exprs.len(), name, 2);
    let left = eval::eval(ctx, &exprs[0], env)?;
    let right = eval::eval(ctx, &exprs[1], env)?;
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::bool(op(*a, *b))),
        (Value::Int(_), other) | (other, _) => Err(LispError::type_error_with_value("int", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;

    fn eval(input: &str) -> EvalResult {
        Interpreter::new().eval_str(input)
    }

    #[test]
    fn test_comparisons() {
        let cases = [
            ("(= 1 1)", Value::True),
            ("(= 1 2)", Value::Nil),
            ("(< 1 2)", Value::True),
            ("(< 2 1)", Value::Nil),
            ("(> 3 2)", Value::True),
            ("(> 2 2)", Value::Nil),
            ("(<= 2 2)", Value::True),
            ("(<= 3 2)", Value::Nil),
            ("(>= 2 2)", Value::True),
            ("(>= 1 2)", Value::Nil),
        ];
        for (src, expected) in cases {
            assert_eq!(eval(src).unwrap(), expected, "{src}");
        }
    }

    #[test]
    fn test_operands_are_evaluated() {
        assert_eq!(eval("(= (+ 1 1) (* 1 2))").unwrap(), Value::True);
    }

    #[test]
    fn test_exactly_two_arguments() {
        for src in ["(= 1)", "(< 1 2 3)", "(>=)"] {
            assert!(
                matches!(eval(src).unwrap_err().inner(), LispError::Arity { .. }),
                "{src}"
            );
        }
    }

    #[test]
    fn test_mismatched_or_unsupported_variants() {
        for src in ["(= 1 \"1\")", "(= \"a\" \"a\")", "(< 'a 1)", "(= nil nil)"] {
            assert!(
                matches!(eval(src).unwrap_err().inner(), LispError::Type { .. }),
                "{src}"
            );
        }
    }
}
