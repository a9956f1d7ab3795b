//! Reader for minilisp: turns characters into values.
//!
//! The grammar is deliberately small: lists, `'` quote shorthand, strings
//! with single-character backslash escapes, decimal integers and symbols.

mod reader;
pub mod source;

pub use reader::{read, read_many, Reader};
pub use source::{CharSource, IoSource, StrSource, WHITESPACE};
