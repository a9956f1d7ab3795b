use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};

use crate::{CallFrame, LispError, StackTrace, Value};

/// Default cap on nested `eval` calls.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 10_000;

/// Per-session evaluation state: call stack, recursion depth and the sink
/// `print` writes to.
pub struct EvalContext {
    pub call_stack: RefCell<Vec<CallFrame>>,
    pub eval_depth: Cell<usize>,
    pub max_eval_depth: Cell<usize>,
    output: RefCell<Box<dyn Write>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        EvalContext {
            call_stack: RefCell::new(Vec::new()),
            eval_depth: Cell::new(0),
            max_eval_depth: Cell::new(DEFAULT_MAX_EVAL_DEPTH),
            output: RefCell::new(output),
        }
    }

    pub fn set_max_eval_depth(&self, limit: usize) {
        self.max_eval_depth.set(limit);
    }

    /// Count one more nested evaluation, failing past the configured limit.
    pub fn enter_eval(&self) -> Result<(), LispError> {
        let depth = self.eval_depth.get() + 1;
        let limit = self.max_eval_depth.get();
        if depth > limit {
            return Err(LispError::RecursionLimit(limit));
        }
        self.eval_depth.set(depth);
        Ok(())
    }

    pub fn exit_eval(&self) {
        self.eval_depth.set(self.eval_depth.get().saturating_sub(1));
    }

    pub fn push_call_frame(&self, frame: CallFrame) {
        self.call_stack.borrow_mut().push(frame);
    }

    pub fn call_stack_depth(&self) -> usize {
        self.call_stack.borrow().len()
    }

    pub fn truncate_call_stack(&self, depth: usize) {
        self.call_stack.borrow_mut().truncate(depth);
    }

    pub fn capture_stack_trace(&self) -> StackTrace {
        let stack = self.call_stack.borrow();
        StackTrace(stack.iter().rev().cloned().collect())
    }

    /// Write a value's printed form and a newline to the output sink.
    pub fn print_value(&self, value: &Value) -> Result<(), LispError> {
        let mut out = self.output.borrow_mut();
        writeln!(out, "{value}")?;
        out.flush()?;
        Ok(())
    }

    /// Reset per-expression state after a failed top-level evaluation.
    pub fn reset(&self) {
        self.call_stack.borrow_mut().clear();
        self.eval_depth.set(0);
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("call_stack", &self.call_stack.borrow())
            .field("eval_depth", &self.eval_depth.get())
            .field("max_eval_depth", &self.max_eval_depth.get())
            .finish_non_exhaustive()
    }
}
