use minilisp_core::{ensure_sufficient_stack, LispError, ListBuilder, Span, Value};

use crate::source::{CharSource, StrSource, WHITESPACE};

/// Characters that may start a symbol besides letters.
const SYMBOL_START: &[char] = &[
    '-', '+', '=', '!', '@', '#', '$', '%', '^', '&', '*', '/', '<', '>', '?',
];

fn is_symbol_start(ch: char) -> bool {
    ch.is_alphabetic() || SYMBOL_START.contains(&ch)
}

fn is_symbol_continue(ch: char) -> bool {
    ch.is_alphanumeric() || SYMBOL_START.contains(&ch)
}

/// Turns a character stream into values, one expression at a time.
pub struct Reader<S> {
    source: S,
}

impl<S: CharSource> Reader<S> {
    pub fn new(source: S) -> Self {
        Reader { source }
    }

    /// Read the next expression, or `None` once the input is exhausted.
    pub fn read_next(&mut self) -> Result<Option<Value>, LispError> {
        self.source.skip_while(WHITESPACE);
        if self.source.peek().is_none() {
            return match self.source.take_error() {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        self.parse_expr().map(Some)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) -> LispError {
        // an early end of input caused by I/O is the better explanation
        self.source
            .take_error()
            .unwrap_or_else(|| LispError::reader(message, span))
    }

    fn parse_expr(&mut self) -> Result<Value, LispError> {
        ensure_sufficient_stack(|| {
            self.source.skip_while(WHITESPACE);
            let span = self.source.position();
            let Some(ch) = self.source.next() else {
                return Err(self.error("unexpected end of input", span));
            };
            match ch {
                '(' => self.parse_list(span),
                ')' => Err(self.error("unexpected ')'", span)),
                '\'' => self.parse_quote(span),
                '"' => self.parse_string(span),
                '0'..='9' => self.parse_number(false, ch, span),
                '-' if self.source.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    let first = self.source.next().unwrap_or('0');
                    self.parse_number(true, first, span)
                }
                c if is_symbol_start(c) => Ok(self.parse_symbol(c)),
                c => Err(self.error(format!("unexpected character '{c}'"), span)),
            }
        })
    }

    fn parse_list(&mut self, open: Span) -> Result<Value, LispError> {
        let mut items = ListBuilder::new();
        loop {
            self.source.skip_while(WHITESPACE);
            match self.source.peek() {
                None => return Err(self.error("unterminated list", open)),
                Some(')') => {
                    self.source.next();
                    return Ok(items.finish());
                }
                Some(_) => items.push(self.parse_expr()?),
            }
        }
    }

    fn parse_quote(&mut self, span: Span) -> Result<Value, LispError> {
        self.source.skip_while(WHITESPACE);
        if self.source.peek().is_none() {
            return Err(self.error("expected an expression after quote", span));
        }
        let quoted = self.parse_expr()?;
        Ok(Value::list([Value::symbol("quote"), quoted]))
    }

    /// A backslash takes the following character literally; there are no
    /// named escapes.
    fn parse_string(&mut self, open: Span) -> Result<Value, LispError> {
        let mut text = String::new();
        loop {
            match self.source.next() {
                None => return Err(self.error("unterminated string", open)),
                Some('"') => return Ok(Value::string(&text)),
                Some('\\') => match self.source.next() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("unterminated string", open)),
                },
                Some(ch) => text.push(ch),
            }
        }
    }

    fn parse_number(&mut self, negative: bool, first: char, span: Span) -> Result<Value, LispError> {
        let mut digits = String::new();
        if negative {
            digits.push('-');
        }
        digits.push(first);
        while let Some(ch) = self.source.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.source.next();
        }
        digits
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| self.error(format!("integer literal {digits} out of range"), span))
    }

    fn parse_symbol(&mut self, first: char) -> Value {
        let mut name = String::from(first);
        while let Some(ch) = self.source.peek() {
            if !is_symbol_continue(ch) {
                break;
            }
            name.push(ch);
            self.source.next();
        }
        Value::symbol(&name)
    }
}

impl<S: CharSource> Iterator for Reader<S> {
    type Item = Result<Value, LispError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

/// Read the first expression of a string; empty input reads as Nil.
pub fn read(input: &str) -> Result<Value, LispError> {
    Ok(Reader::new(StrSource::new(input))
        .read_next()?
        .unwrap_or(Value::Nil))
}

/// Read every expression of a string.
pub fn read_many(input: &str) -> Result<Vec<Value>, LispError> {
    Reader::new(StrSource::new(input)).collect()
}
