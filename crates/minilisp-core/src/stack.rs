//! Stack safety for deep recursion.
//!
//! The evaluator and reader recurse once per nesting level, and tail calls are
//! not eliminated. Wrapping those recursive entry points in
//! [`ensure_sufficient_stack`] grows the native stack on demand so the
//! evaluation depth limit, not the thread's stack size, decides when a program
//! recursed too deeply.

/// If less than this remains, grow the stack.
const RED_ZONE: usize = 100 * 1024;

/// Stack space allocated per growth.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
