use minilisp_core::{check_arity, Env, EvalContext, EvalResult, LispError, Value};

use crate::eval;
use crate::prelude::register_fn;

pub fn register(env: &Env) {
    register_fn(env, "+", add);
    register_fn(env, "-", sub);
    register_fn(env, "*", mul);
    register_fn(env, "/", div);
}

fn add(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    fold(ctx, env, args, "+", |a, b| {
        a.checked_add(b).ok_or_else(|| LispError::Overflow("+".into()))
    })
}

fn sub(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    fold(ctx, env, args, "-", |a, b| {
        a.checked_sub(b).ok_or_else(|| LispError::Overflow("-".into()))
    })
}

fn mul(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    fold(ctx, env, args, "*", |a, b| {
        a.checked_mul(b).ok_or_else(|| LispError::Overflow("*".into()))
    })
}

/// Truncating division.
fn div(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    fold(ctx, env, args, "/", |a, b| {
        if b == 0 {
            return Err(LispError::DivisionByZero);
        }
        a.checked_div(b).ok_or_else(|| LispError::Overflow("/".into()))
    })
}

/// Left fold over the evaluated arguments: `(- 10 3 2)` is `(10 - 3) - 2`.
/// Each operand is evaluated and checked before the next one is touched.
fn fold(
    ctx: &EvalContext,
    env: &Env,
    args: &Value,
    name: &'static str,
    op: impl Fn(i64, i64) -> Result<i64, LispError>,
) -> EvalResult {
    let exprs = args.to_vec()?;
    check_arity!(exprs.len(), name, 2..);
    let mut acc: Option<i64> = None;
    for expr in &exprs {
        let value = eval::eval(ctx, expr, env)?;
        let n = value
            .as_int()
            .ok_or_else(|| LispError::type_error_with_value("int", &value))?;
        acc = Some(match acc {
            None => n,
            Some(total) => op(total, n)?,
        });
    }
    Ok(Value::Int(acc.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;

    fn eval(input: &str) -> EvalResult {
        Interpreter::new().eval_str(input)
    }

    #[test]
    fn test_add() {
        assert_eq!(eval("(+ 1 2 3)").unwrap(), Value::Int(6));
        assert_eq!(eval("(+ -4 4)").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_sub_folds_from_first() {
        assert_eq!(eval("(- 10 3 2)").unwrap(), Value::Int(5));
        assert_eq!(eval("(- 1 5)").unwrap(), Value::Int(-4));
    }

    #[test]
    fn test_mul() {
        assert_eq!(eval("(* 2 3 4)").unwrap(), Value::Int(24));
    }

    #[test]
    fn test_div_truncates() {
        assert_eq!(eval("(/ 100 5 2)").unwrap(), Value::Int(10));
        assert_eq!(eval("(/ 7 2)").unwrap(), Value::Int(3));
        assert_eq!(eval("(/ -7 2)").unwrap(), Value::Int(-3));
    }

    #[test]
    fn test_div_by_zero() {
        assert!(matches!(
            eval("(/ 10 0)").unwrap_err().inner(),
            LispError::DivisionByZero
        ));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            eval("(+ 9223372036854775807 1)").unwrap_err().inner(),
            LispError::Overflow(op) if op == "+"
        ));
        assert!(matches!(
            eval("(* 9223372036854775807 2)").unwrap_err().inner(),
            LispError::Overflow(op) if op == "*"
        ));
        assert!(matches!(
            eval("(/ -9223372036854775808 -1)").unwrap_err().inner(),
            LispError::Overflow(op) if op == "/"
        ));
    }

    #[test]
    fn test_requires_two_arguments() {
        for src in ["(+)", "(+ 1)", "(- 5)", "(* 2)", "(/ 8)"] {
            assert!(
                matches!(eval(src).unwrap_err().inner(), LispError::Arity { .. }),
                "{src}"
            );
        }
    }

    #[test]
    fn test_non_integer_operand() {
        let err = eval("(+ 1 \"two\")").unwrap_err();
        assert!(matches!(
            err.inner(),
            LispError::Type { expected, got, .. } if expected == "int" && got == "string"
        ));
        assert!(matches!(
            eval("(* 2 'x)").unwrap_err().inner(),
            LispError::Type { .. }
        ));
    }

    #[test]
    fn test_operands_evaluated_left_to_right() {
        // the type error on the second operand stops before the unbound third
        assert!(matches!(
            eval("(+ 1 nil undefined-name)").unwrap_err().inner(),
            LispError::Type { .. }
        ));
    }

    #[test]
    fn test_nested_arithmetic() {
        assert_eq!(eval("(* (+ 1 2) (- 10 4))").unwrap(), Value::Int(18));
    }
}
