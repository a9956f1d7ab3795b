//! Primitives that control evaluation of their own arguments.

use minilisp_core::{check_arity, Closure, Env, EvalContext, EvalResult, LispError, Spur, Value};

use crate::eval::{self, eval_sequence};
use crate::prelude::register_fn;

pub fn register(env: &Env) {
    register_fn(env, "do", eval_do);
    register_fn(env, "if", eval_if);
    register_fn(env, "let", eval_let);
    register_fn(env, "define", eval_define);
    register_fn(env, "defun", eval_defun);
    register_fn(env, "lambda", eval_lambda);
    register_fn(env, "quote", eval_quote);
    register_fn(env, "eval", eval_eval);
    register_fn(env, "read", eval_read);
    register_fn(env, "print", eval_print);
}

/// (do expr ...) evaluates in order and returns the last value.
fn eval_do(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    eval_sequence(ctx, args, env)
}

/// (if cond then else ...) with an implicit `do` over the else branch.
fn eval_if(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "if", 2..);
    let cond = eval::eval(ctx, &items[0], env)?;
    if cond.is_truthy() {
        return eval::eval(ctx, &items[1], env);
    }
    let Some((last, init)) = items[2..].split_last() else {
        return eval::eval(ctx, &Value::Nil, env);
    };
    for expr in init {
        eval::eval(ctx, expr, env)?;
    }
    eval::eval(ctx, last, env)
}

/// (let ((name expr) ...) body)
///
/// Bindings are sequential: each value expression sees every binding made
/// before it.
fn eval_let(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "let", 2);
    let bindings = proper_list(&items[0], "let bindings")?;

    let scope = Env::child(env);
    for binding in &bindings {
        let (name, expr) = let_binding(binding)?;
        let value = eval::eval(ctx, &expr, &scope)?;
        scope.bind(name, value);
    }
    eval::eval(ctx, &items[1], &scope)
}

fn let_binding(binding: &Value) -> Result<(Spur, Value), LispError> {
    let malformed = || {
        LispError::malformed(format!(
            "let binding must be (symbol expr), got {}",
            binding.to_string_truncated(40)
        ))
    };
    let parts = match binding {
        Value::Pair(_) => binding.to_vec().map_err(|_| malformed())?,
        _ => return Err(malformed()),
    };
    match parts.as_slice() {
        [Value::Symbol(name), expr] => Ok((*name, expr.clone())),
        _ => Err(malformed()),
    }
}

/// (define name expr) binds in the caller's own scope and returns the value.
fn eval_define(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "define", 2);
    let name = symbol_arg(&items[0])?;
    let value = eval::eval(ctx, &items[1], env)?;
    env.bind(name, value.clone());
    Ok(value)
}

/// (defun name (params ...) body)
fn eval_defun(_ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "defun", 3);
    let name = symbol_arg(&items[0])?;
    let body = Value::list([items[2].clone()]);
    let closure = make_closure(&items[1], body, env, Some(name))?;
    env.bind(name, closure.clone());
    Ok(closure)
}

/// (lambda (params ...) body ...)
fn eval_lambda(_ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let count = args.length()?;
    check_arity!(count, "lambda", 2..);
    let Some(cell) = args.as_pair() else {
        return Err(LispError::arity("lambda", "2+", 0));
    };
    make_closure(cell.head(), cell.tail(), env, None)
}

fn make_closure(params: &Value, body: Value, env: &Env, name: Option<Spur>) -> EvalResult {
    for param in proper_list(params, "parameter list")? {
        symbol_arg(&param)?;
    }
    Ok(Value::closure(Closure {
        params: params.clone(),
        body,
        env: env.downgrade(),
        name,
    }))
}

fn eval_quote(_ctx: &EvalContext, _env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "quote", 1);
    Ok(items[0].clone())
}

/// (eval expr) evaluates `expr`, then evaluates the result again.
fn eval_eval(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "eval", 1);
    let form = eval::eval(ctx, &items[0], env)?;
    eval::eval(ctx, &form, env)
}

/// (read string) parses the first expression of a string without evaluating it.
fn eval_read(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "read", 1);
    let text = eval::eval(ctx, &items[0], env)?;
    let source = text
        .as_str()
        .ok_or_else(|| LispError::type_error_with_value("string", &text))?;
    minilisp_reader::read(source)
}

/// (print expr ...) is `do` that writes every intermediate result.
fn eval_print(ctx: &EvalContext, env: &Env, args: &Value) -> EvalResult {
    let items = args.to_vec()?;
    check_arity!(items.len(), "print", 1..);
    let mut result = Value::Nil;
    for expr in &items {
        result = eval::eval(ctx, expr, env)?;
        ctx.print_value(&result)?;
    }
    Ok(result)
}

fn symbol_arg(value: &Value) -> Result<Spur, LispError> {
    value
        .as_symbol()
        .ok_or_else(|| LispError::type_error_with_value("symbol", value))
}

fn proper_list(value: &Value, what: &str) -> Result<Vec<Value>, LispError> {
    match value {
        Value::Nil | Value::Pair(_) => value.to_vec(),
        other => Err(LispError::malformed(format!(
            "{what} must be a list, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use super::*;
    use crate::Interpreter;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capturing() -> (Interpreter, SharedBuf) {
        let buf = SharedBuf::default();
        let ctx = EvalContext::with_output(Box::new(buf.clone()));
        (Interpreter::with_context(ctx, &[]), buf)
    }

    fn output(buf: &SharedBuf) -> String {
        String::from_utf8(buf.0.borrow().clone()).unwrap()
    }

    fn eval(input: &str) -> EvalResult {
        Interpreter::new().eval_str(input)
    }

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Int(*n)))
    }

    #[test]
    fn test_do_returns_last() {
        assert_eq!(eval("(do 1 2 3)").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_empty_do_is_arity_error() {
        assert!(matches!(
            eval("(do)").unwrap_err().inner(),
            LispError::Arity { name, .. } if name == "do"
        ));
    }

    #[test]
    fn test_if_branches() {
        assert_eq!(eval("(if true 1 2)").unwrap(), Value::Int(1));
        assert_eq!(eval("(if nil 1 2)").unwrap(), Value::Int(2));
        assert_eq!(eval("(if 0 1 2)").unwrap(), Value::Int(1));
        assert_eq!(eval("(if \"\" 1 2)").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_if_false_without_else_is_nil() {
        assert_eq!(eval("(if false 1)").unwrap(), Value::Nil);
    }

    #[test]
    fn test_if_else_is_implicit_do() {
        let (interp, buf) = capturing();
        let result = interp.eval_str("(if false 1 (print 2) 3)").unwrap();
        assert_eq!(result, Value::Int(3));
        assert_eq!(output(&buf), "2\n");
    }

    #[test]
    fn test_if_does_not_evaluate_untaken_branch() {
        assert_eq!(eval("(if true 1 undefined-name)").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_if_arity() {
        assert!(matches!(
            eval("(if true)").unwrap_err().inner(),
            LispError::Arity { .. }
        ));
    }

    #[test]
    fn test_let_is_sequential() {
        assert_eq!(
            eval("(let ((a 1) (b (+ a 1))) (+ a b))").unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_let_scope_does_not_leak() {
        let interp = Interpreter::new();
        interp.eval_str("(let ((hidden 1)) hidden)").unwrap();
        assert!(matches!(
            interp.eval_str("hidden").unwrap_err().inner(),
            LispError::Unbound(_)
        ));
    }

    #[test]
    fn test_let_shadows_outer() {
        let interp = Interpreter::new();
        interp.eval_str("(define x 10)").unwrap();
        assert_eq!(interp.eval_str("(let ((x 1)) x)").unwrap(), Value::Int(1));
        assert_eq!(interp.eval_str("x").unwrap(), Value::Int(10));
    }

    #[test]
    fn test_let_empty_bindings() {
        assert_eq!(eval("(let () 5)").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_let_malformed_bindings() {
        for src in [
            "(let 5 1)",
            "(let (x) 1)",
            "(let ((x)) 1)",
            "(let ((1 2)) 1)",
            "(let ((x 1 2)) 1)",
        ] {
            assert!(
                matches!(eval(src).unwrap_err().inner(), LispError::MalformedList(_)),
                "{src}"
            );
        }
    }

    #[test]
    fn test_define_returns_value_and_binds() {
        let interp = Interpreter::new();
        assert_eq!(interp.eval_str("(define x (+ 1 2))").unwrap(), Value::Int(3));
        assert_eq!(interp.eval_str("x").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_define_requires_symbol() {
        assert!(matches!(
            eval("(define 1 2)").unwrap_err().inner(),
            LispError::Type { .. }
        ));
    }

    #[test]
    fn test_define_inside_closure_is_local() {
        let interp = Interpreter::new();
        interp
            .eval_str("(defun f (x) (do (define y (* x 2)) y))")
            .unwrap();
        assert_eq!(interp.eval_str("(f 4)").unwrap(), Value::Int(8));
        assert!(interp.eval_str("y").is_err());
    }

    #[test]
    fn test_lambda_creates_closure_without_evaluating() {
        let value = eval("(lambda (x) undefined-name)").unwrap();
        assert_eq!(value.type_name(), "closure");
    }

    #[test]
    fn test_lambda_multi_expression_body() {
        let (interp, buf) = capturing();
        let result = interp
            .eval_str("((lambda (x) (print x) (+ x 1)) 41)")
            .unwrap();
        assert_eq!(result, Value::Int(42));
        assert_eq!(output(&buf), "41\n");
    }

    #[test]
    fn test_lambda_rejects_bad_params() {
        assert!(matches!(
            eval("(lambda (x 1) x)").unwrap_err().inner(),
            LispError::Type { .. }
        ));
        assert!(matches!(
            eval("(lambda x x)").unwrap_err().inner(),
            LispError::MalformedList(_)
        ));
        assert!(matches!(
            eval("(lambda (x))").unwrap_err().inner(),
            LispError::Arity { .. }
        ));
    }

    #[test]
    fn test_defun_binds_named_closure() {
        let interp = Interpreter::new();
        let f = interp.eval_str("(defun square (x) (* x x))").unwrap();
        assert_eq!(f.to_string(), "<closure square>");
        assert_eq!(interp.eval_str("(square 9)").unwrap(), Value::Int(81));
    }

    #[test]
    fn test_closure_arity_mismatch() {
        let interp = Interpreter::new();
        interp.eval_str("(defun pair-sum (a b) (+ a b))").unwrap();
        let err = interp.eval_str("(pair-sum 1)").unwrap_err();
        assert!(matches!(
            err.inner(),
            LispError::Arity { name, expected, got } if name == "pair-sum" && expected == "2" && *got == 1
        ));
    }

    #[test]
    fn test_closure_captures_by_reference() {
        let interp = Interpreter::new();
        interp.eval_str("(define n 1)").unwrap();
        interp.eval_str("(defun get-n () n)").unwrap();
        interp.eval_str("(define n 2)").unwrap();
        assert_eq!(interp.eval_str("(get-n)").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_closure_outliving_its_scope_is_dead() {
        let interp = Interpreter::new();
        interp
            .eval_str("(defun make-adder (n) (lambda (x) (+ x n)))")
            .unwrap();
        // make-adder's call scope is released when it returns
        assert!(matches!(
            interp.eval_str("((make-adder 5) 10)").unwrap_err().inner(),
            LispError::DeadEnvironment
        ));
    }

    #[test]
    fn test_closure_within_let_scope() {
        assert_eq!(
            eval("(let ((add5 (lambda (x) (+ x 5)))) (add5 10))").unwrap(),
            Value::Int(15)
        );
    }

    #[test]
    fn test_recursive_defun() {
        let interp = Interpreter::new();
        interp
            .eval_str("(defun fact (n) (if (<= n 1) 1 (* n (fact (- n 1)))))")
            .unwrap();
        assert_eq!(interp.eval_str("(fact 10)").unwrap(), Value::Int(3_628_800));
    }

    #[test]
    fn test_quote_is_unevaluated() {
        assert_eq!(eval("(quote (1 2 3))").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(eval("'undefined-name").unwrap(), Value::symbol("undefined-name"));
        assert_eq!(
            eval("'(+ 1 2)").unwrap(),
            Value::list([Value::symbol("+"), Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_eval_double_evaluation() {
        assert_eq!(eval("(eval '(+ 1 2))").unwrap(), Value::Int(3));
        assert_eq!(eval("(eval (quote (quote (1 2 3))))").unwrap(), ints(&[1, 2, 3]));
        let interp = Interpreter::new();
        interp.eval_str("(define code '(* 6 7))").unwrap();
        assert_eq!(interp.eval_str("(eval code)").unwrap(), Value::Int(42));
    }

    #[test]
    fn test_eval_uses_callers_environment() {
        assert_eq!(eval("(let ((x 3)) (eval 'x))").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_read_parses_without_evaluating() {
        assert_eq!(
            eval("(read \"(+ 1 2)\")").unwrap(),
            Value::list([Value::symbol("+"), Value::Int(1), Value::Int(2)])
        );
        assert_eq!(eval("(eval (read \"(+ 1 2)\"))").unwrap(), Value::Int(3));
        assert_eq!(eval("(read \"\")").unwrap(), Value::Nil);
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(
            eval("(read 5)").unwrap_err().inner(),
            LispError::Type { .. }
        ));
        assert!(matches!(
            eval("(read \"(1 2\")").unwrap_err().inner(),
            LispError::Reader { .. }
        ));
    }

    #[test]
    fn test_print_writes_each_value() {
        let (interp, buf) = capturing();
        let result = interp.eval_str("(print 1 \"two\" '(3 x))").unwrap();
        assert_eq!(result, Value::list([Value::Int(3), Value::symbol("x")]));
        assert_eq!(output(&buf), "1\n\"two\"\n(3 x)\n");
    }

    #[test]
    fn test_print_side_effects_survive_later_error() {
        let (interp, buf) = capturing();
        assert!(interp.eval_str("(print 1 undefined-name)").is_err());
        assert_eq!(output(&buf), "1\n");
    }

    #[test]
    fn test_single_argument_forms_check_arity() {
        for src in ["(quote)", "(quote 1 2)", "(eval)", "(read)"] {
            assert!(
                matches!(eval(src).unwrap_err().inner(), LispError::Arity { .. }),
                "{src}"
            );
        }
    }
}
