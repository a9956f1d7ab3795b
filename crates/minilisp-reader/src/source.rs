use std::io::{self, BufRead};
use std::str::Chars;

use minilisp_core::{LispError, Span};

/// Characters skipped between expressions.
pub const WHITESPACE: &[char] = &[' ', '\n', '\r', '\t'];

/// A stream of characters the reader consumes. `None` is the end-of-input
/// sentinel.
pub trait CharSource {
    fn next(&mut self) -> Option<char>;

    fn peek(&mut self) -> Option<char>;

    /// Position of the next character to be returned by [`CharSource::next`].
    fn position(&self) -> Span;

    fn skip_while(&mut self, set: &[char]) {
        while let Some(ch) = self.peek() {
            if !set.contains(&ch) {
                break;
            }
            self.next();
        }
    }

    /// An I/O failure that ended the stream early, if any.
    fn take_error(&mut self) -> Option<LispError> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    line: usize,
    col: usize,
}

impl Cursor {
    fn start() -> Self {
        Cursor { line: 1, col: 1 }
    }

    fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.col)
    }
}

/// In-memory source over a string slice.
pub struct StrSource<'a> {
    chars: Chars<'a>,
    peeked: Option<char>,
    cursor: Cursor,
}

impl<'a> StrSource<'a> {
    pub fn new(input: &'a str) -> Self {
        StrSource {
            chars: input.chars(),
            peeked: None,
            cursor: Cursor::start(),
        }
    }
}

impl CharSource for StrSource<'_> {
    fn next(&mut self) -> Option<char> {
        let ch = self.peeked.take().or_else(|| self.chars.next())?;
        self.cursor.advance(ch);
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn position(&self) -> Span {
        self.cursor.span()
    }
}

/// Streaming source over any buffered reader (a file, stdin). Pulls one line
/// at a time, so an expression can be read before the rest of the input
/// exists.
pub struct IoSource<R> {
    reader: R,
    line: Vec<char>,
    pos: usize,
    cursor: Cursor,
    eof: bool,
    error: Option<io::Error>,
}

impl<R: BufRead> IoSource<R> {
    pub fn new(reader: R) -> Self {
        IoSource {
            reader,
            line: Vec::new(),
            pos: 0,
            cursor: Cursor::start(),
            eof: false,
            error: None,
        }
    }

    fn fill(&mut self) -> bool {
        while self.pos >= self.line.len() {
            if self.eof {
                return false;
            }
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return false;
                }
                Ok(_) => {
                    self.line = buf.chars().collect();
                    self.pos = 0;
                }
                Err(e) => {
                    self.error = Some(e);
                    self.eof = true;
                    return false;
                }
            }
        }
        true
    }
}

impl<R: BufRead> CharSource for IoSource<R> {
    fn next(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        let ch = self.line[self.pos];
        self.pos += 1;
        self.cursor.advance(ch);
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        Some(self.line[self.pos])
    }

    fn position(&self) -> Span {
        self.cursor.span()
    }

    fn take_error(&mut self) -> Option<LispError> {
        self.error.take().map(LispError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_source_peek_does_not_consume() {
        let mut s = StrSource::new("ab");
        assert_eq!(s.peek(), Some('a'));
        assert_eq!(s.peek(), Some('a'));
        assert_eq!(s.next(), Some('a'));
        assert_eq!(s.next(), Some('b'));
        assert_eq!(s.next(), None);
        assert_eq!(s.peek(), None);
    }

    #[test]
    fn skip_while_stops_at_first_non_member() {
        let mut s = StrSource::new(" \t\r\n x");
        s.skip_while(WHITESPACE);
        assert_eq!(s.next(), Some('x'));
    }

    #[test]
    fn position_tracks_lines_and_columns() {
        let mut s = StrSource::new("a\nbc");
        assert_eq!(s.position(), Span::new(1, 1));
        s.next();
        s.next();
        assert_eq!(s.position(), Span::new(2, 1));
        s.next();
        assert_eq!(s.position(), Span::new(2, 2));
    }

    #[test]
    fn io_source_reads_across_lines() {
        let mut s = IoSource::new("(a\n b)\n".as_bytes());
        let mut out = String::new();
        while let Some(ch) = s.next() {
            out.push(ch);
        }
        assert_eq!(out, "(a\n b)\n");
        assert_eq!(s.position(), Span::new(3, 1));
        assert!(s.take_error().is_none());
    }

    #[test]
    fn io_source_reports_invalid_utf8() {
        let bytes: &[u8] = &[b'(', 0xff, 0xfe, b'\n'];
        let mut s = IoSource::new(bytes);
        assert_eq!(s.next(), None);
        assert!(matches!(s.take_error(), Some(LispError::Io(_))));
    }
}
