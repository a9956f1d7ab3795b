//! minilisp: a small Lisp with an eval/apply core.
//!
//! This module provides the embedding API.
//!
//! # Quick Start
//!
//! ```no_run
//! use minilisp::{Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! interp.eval_str("(defun square (x) (* x x))").unwrap();
//! assert_eq!(interp.eval_str("(square 7)").unwrap(), Value::Int(49));
//! ```

use std::io::{BufRead, Write};

use minilisp_core::EvalContext;
use minilisp_reader::{IoSource, Reader};

// Re-export core types.
pub use minilisp_core::{
    intern, resolve, Env, EvalResult, LispError, PrimitiveFn, Value, DEFAULT_MAX_EVAL_DEPTH,
};
pub use minilisp_reader::{read, read_many};

pub type Result<T> = std::result::Result<T, LispError>;

/// Builder for configuring and constructing an [`Interpreter`].
pub struct InterpreterBuilder {
    args: Vec<String>,
    max_depth: usize,
    output: Option<Box<dyn Write>>,
}

impl Default for InterpreterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
            output: None,
        }
    }

    /// Strings bound as the `argv` list in the root environment.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Cap on nested evaluations before `RecursionLimit` is raised.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sink for `print` (stdout by default).
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> Interpreter {
        let ctx = match self.output {
            Some(output) => EvalContext::with_output(output),
            None => EvalContext::new(),
        };
        ctx.set_max_eval_depth(self.max_depth);
        tracing::debug!(
            args = self.args.len(),
            max_depth = self.max_depth,
            "interpreter created"
        );
        Interpreter {
            inner: minilisp_eval::Interpreter::with_context(ctx, &self.args),
        }
    }
}

/// A minilisp interpreter instance. Each instance owns an independent root
/// environment.
pub struct Interpreter {
    inner: minilisp_eval::Interpreter,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        InterpreterBuilder::new().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Evaluate a single parsed expression. Definitions persist across calls.
    pub fn eval(&self, expr: &Value) -> EvalResult {
        self.inner.eval(expr)
    }

    /// Parse and evaluate every expression in `input`, returning the last
    /// result.
    pub fn eval_str(&self, input: &str) -> EvalResult {
        self.inner.eval_str(input)
    }

    /// Read and evaluate expressions from a buffered reader one at a time,
    /// handing each result to `on_result`. Stops at the first error.
    pub fn run<R: BufRead>(&self, input: R, mut on_result: impl FnMut(&Value)) -> Result<()> {
        let mut reader = Reader::new(IoSource::new(input));
        while let Some(expr) = reader.read_next()? {
            let value = self.eval(&expr)?;
            on_result(&value);
        }
        Ok(())
    }

    /// Bind a native primitive. It receives its arguments unevaluated.
    pub fn register_fn(&self, name: &'static str, func: PrimitiveFn) {
        self.inner
            .global_env
            .bind_str(name, Value::primitive(name, func));
    }

    pub fn global_env(&self) -> &Env {
        &self.inner.global_env
    }
}
