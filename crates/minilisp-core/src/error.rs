use std::fmt;

use crate::value::Value;

/// Check the argument count of a primitive, returning `LispError::Arity` on mismatch.
///
/// # Forms
///
/// ```ignore
/// check_arity!(count, "fn-name", 2);     // exactly 2
/// check_arity!(count, "fn-name", 2..);   // 2 or more
/// ```
#[macro_export]
macro_rules! check_arity {
    ($count:expr, $name:expr, $exact:literal) => {
        if $count != $exact {
            return Err($crate::LispError::arity($name, stringify!($exact), $count));
        }
    };
    ($count:expr, $name:expr, $lo:literal ..) => {
        if $count < $lo {
            return Err($crate::LispError::arity(
                $name,
                concat!(stringify!($lo), "+"),
                $count,
            ));
        }
    };
}

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A single frame in a call stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub name: String,
}

/// A captured stack trace (innermost first).
#[derive(Debug, Clone)]
pub struct StackTrace(pub Vec<CallFrame>);

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.0 {
            writeln!(f, "  at {}", frame.name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LispError {
    #[error("Reader error at {span}: {message}")]
    Reader { message: String, span: Span },

    #[error("Unbound symbol: {0}")]
    Unbound(String),

    #[error("Not callable: {value} ({type_name})")]
    NotCallable { value: String, type_name: String },

    #[error("Arity error: {name} expects {expected} args, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Type error: expected {expected}, got {got}{}", got_value.as_ref().map(|v| format!(" ({v})")).unwrap_or_default())]
    Type {
        expected: String,
        got: String,
        got_value: Option<String>,
    },

    #[error("Malformed list: {0}")]
    MalformedList(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in {0}")]
    Overflow(String),

    #[error("Closure environment no longer exists")]
    DeadEnvironment,

    #[error("Recursion limit of {0} nested evaluations exceeded")]
    RecursionLimit(usize),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{inner}")]
    WithTrace {
        inner: Box<LispError>,
        trace: StackTrace,
    },

    #[error("{inner}")]
    WithContext {
        inner: Box<LispError>,
        hint: Option<String>,
    },
}

/// Compute the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Find the most similar name from a list of candidates.
/// Returns `None` if no candidate is close enough.
pub fn suggest_similar<S: AsRef<str>>(name: &str, candidates: &[S]) -> Option<String> {
    // roughly a third of the name, clamped to 1..=3
    let threshold = (name.len() / 3).clamp(1, 3);

    candidates
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|c| {
            let d = edit_distance(name, c);
            if d > 0 && d <= threshold {
                Some((c, d))
            } else {
                None
            }
        })
        .min_by_key(|(_, d)| *d)
        .map(|(name, _)| name.to_string())
}

/// Longest rendering of an offending value kept in an error message.
const VALUE_DISPLAY_LIMIT: usize = 40;

impl LispError {
    pub fn reader(message: impl Into<String>, span: Span) -> Self {
        LispError::Reader {
            message: message.into(),
            span,
        }
    }

    pub fn not_callable(value: &Value) -> Self {
        LispError::NotCallable {
            value: value.to_string_truncated(VALUE_DISPLAY_LIMIT),
            type_name: value.type_name().to_string(),
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        LispError::Type {
            expected: expected.into(),
            got: got.into(),
            got_value: None,
        }
    }

    pub fn type_error_with_value(expected: impl Into<String>, value: &Value) -> Self {
        LispError::Type {
            expected: expected.into(),
            got: value.type_name().to_string(),
            got_value: Some(value.to_string_truncated(VALUE_DISPLAY_LIMIT)),
        }
    }

    pub fn arity(name: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        LispError::Arity {
            name: name.into(),
            expected: expected.into(),
            got,
        }
    }

    pub fn malformed(context: impl Into<String>) -> Self {
        LispError::MalformedList(context.into())
    }

    /// Attach a hint (actionable suggestion) to this error.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            LispError::WithContext { inner, .. } => LispError::WithContext {
                inner,
                hint: Some(hint.into()),
            },
            other => LispError::WithContext {
                inner: Box::new(other),
                hint: Some(hint.into()),
            },
        }
    }

    /// Get the hint from this error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            LispError::WithContext { hint, .. } => hint.as_deref(),
            LispError::WithTrace { inner, .. } => inner.hint(),
            _ => None,
        }
    }

    /// Wrap this error with a stack trace (no-op if already wrapped).
    pub fn with_stack_trace(self, trace: StackTrace) -> Self {
        if trace.0.is_empty() {
            return self;
        }
        match self {
            LispError::WithTrace { .. } => self,
            LispError::WithContext { inner, hint } => LispError::WithContext {
                inner: Box::new(inner.with_stack_trace(trace)),
                hint,
            },
            other => LispError::WithTrace {
                inner: Box::new(other),
                trace,
            },
        }
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        match self {
            LispError::WithTrace { trace, .. } => Some(trace),
            LispError::WithContext { inner, .. } => inner.stack_trace(),
            _ => None,
        }
    }

    /// The underlying error with any trace or hint wrappers removed.
    pub fn inner(&self) -> &LispError {
        match self {
            LispError::WithTrace { inner, .. } => inner.inner(),
            LispError::WithContext { inner, .. } => inner.inner(),
            other => other,
        }
    }
}

impl From<std::io::Error> for LispError {
    fn from(e: std::io::Error) -> Self {
        LispError::Io(e.to_string())
    }
}
