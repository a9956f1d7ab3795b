use minilisp_core::{
    ensure_sufficient_stack, resolve, suggest_similar, CallFrame, Closure, Env,
    EvalContext, EvalResult, LispError, ListBuilder, Spur, Value,
};
use minilisp_reader::{Reader, StrSource};

use crate::prelude;

/// RAII guard that truncates the call stack on drop.
struct CallStackGuard<'a> {
    ctx: &'a EvalContext,
    entry_depth: usize,
}

impl<'a> CallStackGuard<'a> {
    fn push(ctx: &'a EvalContext, name: String) -> Self {
        let entry_depth = ctx.call_stack_depth();
        ctx.push_call_frame(CallFrame { name });
        CallStackGuard { ctx, entry_depth }
    }
}

impl Drop for CallStackGuard<'_> {
    fn drop(&mut self) {
        self.ctx.truncate_call_stack(self.entry_depth);
    }
}

/// RAII guard that leaves one level of eval depth on drop.
struct DepthGuard<'a> {
    ctx: &'a EvalContext,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.ctx.exit_eval();
    }
}

/// The interpreter holds the process-wide environment and evaluation state.
pub struct Interpreter {
    pub global_env: Env,
    pub ctx: EvalContext,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(EvalContext::new(), &[])
    }

    /// An interpreter over a prepared context, with `args` bound as `argv`.
    pub fn with_context(ctx: EvalContext, args: &[String]) -> Self {
        Interpreter {
            global_env: prelude::root_env(args),
            ctx,
        }
    }

    /// Evaluate one expression at top level. A failure aborts only this
    /// expression; side effects it already performed remain.
    pub fn eval(&self, expr: &Value) -> EvalResult {
        let result = eval(&self.ctx, expr, &self.global_env);
        if result.is_err() {
            self.ctx.reset();
        }
        result
    }

    /// Read and evaluate every expression in `input`, returning the last
    /// result (Nil for empty input).
    pub fn eval_str(&self, input: &str) -> EvalResult {
        let result = eval_string(&self.ctx, input, &self.global_env);
        if result.is_err() {
            self.ctx.reset();
        }
        result
    }
}

/// Read and evaluate expressions one at a time, so an expression runs before
/// later input is parsed.
pub fn eval_string(ctx: &EvalContext, input: &str, env: &Env) -> EvalResult {
    let mut reader = Reader::new(StrSource::new(input));
    let mut result = Value::Nil;
    while let Some(expr) = reader.read_next()? {
        result = eval(ctx, &expr, env)?;
    }
    Ok(result)
}

/// The core eval function: evaluate a Value in an environment.
pub fn eval(ctx: &EvalContext, expr: &Value, env: &Env) -> EvalResult {
    ensure_sufficient_stack(|| {
        ctx.enter_eval()?;
        let _depth = DepthGuard { ctx };
        eval_inner(ctx, expr, env)
    })
}

fn eval_inner(ctx: &EvalContext, expr: &Value, env: &Env) -> EvalResult {
    match expr {
        Value::Nil | Value::True | Value::Int(_) | Value::String(_) => Ok(expr.clone()),

        Value::Symbol(name) => env.lookup(*name).ok_or_else(|| unbound(*name, env)),

        // The callable receives the raw argument list.
        Value::Pair(cell) => {
            let callable = eval(ctx, cell.head(), env)?;
            apply(ctx, env, &callable, &cell.tail())
        }

        // Already-evaluated runtime objects, reachable through `eval`.
        Value::Environment(_) | Value::Primitive(_) | Value::Closure(_) => Ok(expr.clone()),
    }
}

fn unbound(name: Spur, env: &Env) -> LispError {
    let name = resolve(name);
    let candidates = env.names();
    let err = LispError::Unbound(name.clone());
    match suggest_similar(&name, &candidates) {
        Some(similar) => err.with_hint(format!("did you mean '{similar}'?")),
        None => err,
    }
}

/// Apply a callable to an unevaluated argument list.
pub fn apply(ctx: &EvalContext, env: &Env, callable: &Value, args: &Value) -> EvalResult {
    match callable {
        Value::Primitive(primitive) => {
            let _frame = CallStackGuard::push(ctx, primitive.name.to_string());
            (primitive.func)(ctx, env, args).map_err(|e| attach_trace(ctx, e))
        }
        Value::Closure(closure) => apply_closure(ctx, env, closure, args),
        other => Err(LispError::not_callable(other)),
    }
}

fn attach_trace(ctx: &EvalContext, err: LispError) -> LispError {
    if err.stack_trace().is_none() {
        err.with_stack_trace(ctx.capture_stack_trace())
    } else {
        err
    }
}

fn closure_name(closure: &Closure) -> String {
    match closure.name {
        Some(name) => resolve(name),
        None => "<closure>".to_string(),
    }
}

/// Arguments are evaluated in the caller's environment; parameters are bound
/// in a fresh child of the closure's defining environment.
fn apply_closure(ctx: &EvalContext, env: &Env, closure: &Closure, args: &Value) -> EvalResult {
    let name = closure_name(closure);
    let expected = closure.params.length()?;
    let got = args.length()?;
    if expected != got {
        return Err(LispError::arity(name, expected.to_string(), got));
    }

    let Some(defining_env) = closure.env.upgrade() else {
        tracing::warn!(closure = %name, "closure called after its environment was dropped");
        return Err(LispError::DeadEnvironment);
    };

    let values = eval_list(ctx, args, env)?;

    tracing::trace!(closure = %name, args = got, "apply");
    let _frame = CallStackGuard::push(ctx, name);
    let call_env = Env::child(&defining_env);
    for (param, value) in closure.params.iter().zip(values.iter()) {
        let param = param
            .as_symbol()
            .ok_or_else(|| LispError::type_error_with_value("symbol", &param))?;
        call_env.bind(param, value);
    }
    eval_sequence(ctx, &closure.body, &call_env).map_err(|e| attach_trace(ctx, e))
}

/// Evaluate each element of a list, left to right, into a new list.
pub fn eval_list(ctx: &EvalContext, args: &Value, env: &Env) -> EvalResult {
    let mut results = ListBuilder::new();
    for arg in args.to_vec()? {
        results.push(eval(ctx, &arg, env)?);
    }
    Ok(results.finish())
}

/// Evaluate a list of expressions in order and return the last result.
/// An empty sequence is an error.
pub fn eval_sequence(ctx: &EvalContext, exprs: &Value, env: &Env) -> EvalResult {
    let exprs = exprs.to_vec()?;
    let Some((last, init)) = exprs.split_last() else {
        return Err(LispError::arity("do", "1+", 0));
    };
    for expr in init {
        eval(ctx, expr, env)?;
    }
    eval(ctx, last, env)
}
