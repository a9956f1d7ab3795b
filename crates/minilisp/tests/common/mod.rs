#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use minilisp::{Interpreter, LispError, Value};

/// Evaluate in a fresh interpreter, panicking on error.
pub fn eval(input: &str) -> Value {
    Interpreter::new()
        .eval_str(input)
        .unwrap_or_else(|e| panic!("failed to eval `{input}`: {e}"))
}

/// Evaluate in a fresh interpreter, expecting an error; returns the
/// underlying error without trace or hint wrappers.
pub fn eval_err(input: &str) -> LispError {
    match Interpreter::new().eval_str(input) {
        Ok(val) => panic!("expected `{input}` to fail, got {val}"),
        Err(e) => e.inner().clone(),
    }
}

/// A `Write` sink that can be inspected after the interpreter is done with it.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An interpreter whose `print` output is captured.
pub fn capturing() -> (Interpreter, SharedBuf) {
    let buf = SharedBuf::default();
    let interp = Interpreter::builder()
        .with_output(Box::new(buf.clone()))
        .build();
    (interp, buf)
}
