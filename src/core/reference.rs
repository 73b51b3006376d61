//! Textual block references
//!
//! A block title names the function it calls, optionally with literal
//! arguments:
//!
//! ```text
//! intro
//! circle(10, 20.5, "red")
//! scene(true, [1, 2, [3]], 'title')
//! ```
//!
//! Arguments are restricted to literals (numbers, strings, booleans and
//! nested arrays). Nothing is evaluated.

use crate::core::Value;
use crate::error::ReferenceError;

/// A parsed call expression
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Value>,
}

/// Parse a block title into a function name and its literal arguments
pub fn parse_call(text: &str) -> Result<CallExpr, ReferenceError> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    if parser.at_end() {
        return Err(ReferenceError::Empty);
    }

    let name = parser.ident()?;
    parser.skip_ws();

    let args = if parser.peek() == Some('(') {
        parser.bump();
        let args = parser.list(')')?;
        parser.skip_ws();
        args
    } else {
        Vec::new()
    };

    match parser.peek() {
        None => Ok(CallExpr { name, args }),
        Some(ch) => Err(ReferenceError::UnexpectedChar { ch, pos: parser.pos }),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> Result<String, ReferenceError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return Err(ReferenceError::InvalidName { pos: start }),
        }
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Comma separated literals up to (and consuming) `close`
    fn list(&mut self, close: char) -> Result<Vec<Value>, ReferenceError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(items);
        }

        loop {
            items.push(self.literal()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                Some(ch) => {
                    return Err(ReferenceError::UnexpectedChar { ch, pos: self.pos - 1 })
                }
                None => return Err(ReferenceError::UnexpectedEnd),
            }
        }
    }

    fn literal(&mut self) -> Result<Value, ReferenceError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ReferenceError::UnexpectedEnd),
            Some('"') | Some('\'') => self.string().map(Value::Str),
            Some('[') => {
                self.bump();
                self.list(']').map(Value::Array)
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => {
                let start = self.pos;
                let word = self.ident()?;
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(ReferenceError::UnexpectedChar { ch: c, pos: start }),
                }
            }
            Some(ch) => Err(ReferenceError::UnexpectedChar { ch, pos: self.pos }),
        }
    }

    fn number(&mut self) -> Result<Value, ReferenceError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && matches!(self.chars.get(self.pos.wrapping_sub(1)), Some('e') | Some('E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::Number)
            .ok_or(ReferenceError::InvalidNumber { text })
    }

    fn string(&mut self) -> Result<String, ReferenceError> {
        let start = self.pos;
        let quote = self.bump().ok_or(ReferenceError::UnexpectedEnd)?;
        let mut out = String::new();

        loop {
            match self.bump() {
                None => return Err(ReferenceError::UnterminatedString { pos: start }),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(ReferenceError::UnterminatedString { pos: start }),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}
