// Iskra Reader - S-Expression Parser
//
// A peekable character scanner producing value trees: lists with dotted
// tails, quote sugar, strings, character literals, #(...) vectors and
// line comments. Symbol names canonicalise to upper case.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::arena::Arena;
use crate::classes;
use crate::conditions::{self, Signal};
use crate::eval::Interpreter;
use crate::symbol::SymbolTable;
use crate::types::{Value, ValueId};

/// Reader error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReaderError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unbalanced parentheses")]
    UnbalancedParen,
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid character literal: {0}")]
    InvalidChar(String),
}

pub type ReaderResult = Result<ValueId, ReaderError>;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\'')
}

/// The Iskra Reader
pub struct Reader<'a> {
    input: Peekable<Chars<'a>>,
    arena: &'a mut Arena,
    symbols: &'a mut SymbolTable,
    nil: ValueId,
}

impl<'a> Reader<'a> {
    pub fn new(
        input: &'a str,
        arena: &'a mut Arena,
        symbols: &'a mut SymbolTable,
        nil: ValueId,
    ) -> Self {
        Self {
            input: input.chars().peekable(),
            arena,
            symbols,
            nil,
        }
    }

    /// Read a single expression
    pub fn read(&mut self) -> ReaderResult {
        self.skip_whitespace();
        match self.input.peek() {
            None => Err(ReaderError::UnexpectedEof),
            Some(&'(') => {
                self.input.next();
                self.read_list()
            }
            Some(&')') => {
                self.input.next();
                Err(ReaderError::UnexpectedChar(')'))
            }
            Some(&'\'') => {
                self.input.next();
                self.read_quote()
            }
            Some(&'"') => {
                self.input.next();
                self.read_string()
            }
            Some(&'#') => {
                self.input.next();
                self.read_dispatch()
            }
            Some(_) => self.read_atom(),
        }
    }

    /// Skip whitespace and line comments
    fn skip_whitespace(&mut self) {
        loop {
            match self.input.peek() {
                Some(&c) if c.is_whitespace() => {
                    self.input.next();
                }
                Some(&';') => {
                    for c in self.input.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Read a list body after the opening paren
    fn read_list(&mut self) -> ReaderResult {
        let mut elements = Vec::new();
        let mut tail = self.nil;
        loop {
            self.skip_whitespace();
            match self.input.peek() {
                None => return Err(ReaderError::UnbalancedParen),
                Some(&')') => {
                    self.input.next();
                    break;
                }
                Some(&'.') => {
                    self.input.next();
                    match self.input.peek() {
                        Some(&c) if !is_delimiter(c) => {
                            return Err(ReaderError::UnexpectedChar('.'));
                        }
                        _ => {
                            if elements.is_empty() {
                                return Err(ReaderError::UnexpectedChar('.'));
                            }
                            tail = self.read()?;
                            self.skip_whitespace();
                            match self.input.next() {
                                Some(')') => break,
                                Some(c) => return Err(ReaderError::UnexpectedChar(c)),
                                None => return Err(ReaderError::UnbalancedParen),
                            }
                        }
                    }
                }
                Some(_) => elements.push(self.read()?),
            }
        }
        let mut list = tail;
        for &e in elements.iter().rev() {
            list = self.arena.alloc(Value::Cons(e, list));
        }
        Ok(list)
    }

    /// 'x reads as (QUOTE x)
    fn read_quote(&mut self) -> ReaderResult {
        let quoted = self.read()?;
        let quote_sym = self.symbols.intern("QUOTE");
        let quote = self.arena.alloc(Value::Symbol(quote_sym));
        let tail = self.arena.alloc(Value::Cons(quoted, self.nil));
        Ok(self.arena.alloc(Value::Cons(quote, tail)))
    }

    fn read_dispatch(&mut self) -> ReaderResult {
        match self.input.next() {
            Some('\\') => self.read_character(),
            Some('(') => self.read_vector(),
            Some(c) => Err(ReaderError::UnexpectedChar(c)),
            None => Err(ReaderError::UnexpectedEof),
        }
    }

    /// #\c, #\SPACE, #\NEWLINE, #\TAB
    fn read_character(&mut self) -> ReaderResult {
        let first = self.input.next().ok_or(ReaderError::UnexpectedEof)?;
        if !first.is_alphabetic() {
            return Ok(self.arena.alloc(Value::Character(first)));
        }
        let mut name = String::new();
        name.push(first);
        while let Some(&c) = self.input.peek() {
            if c.is_alphabetic() {
                name.push(c);
                self.input.next();
            } else {
                break;
            }
        }
        if name.chars().count() == 1 {
            return Ok(self.arena.alloc(Value::Character(first)));
        }
        let ch = match name.to_uppercase().as_str() {
            "SPACE" => ' ',
            "NEWLINE" => '\n',
            "TAB" => '\t',
            _ => return Err(ReaderError::InvalidChar(name)),
        };
        Ok(self.arena.alloc(Value::Character(ch)))
    }

    fn read_string(&mut self) -> ReaderResult {
        let mut out = String::new();
        loop {
            match self.input.next() {
                None => return Err(ReaderError::UnexpectedEof),
                Some('"') => break,
                Some('\\') => match self.input.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(ReaderError::UnexpectedEof),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(self.arena.alloc(Value::String(out)))
    }

    fn read_vector(&mut self) -> ReaderResult {
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace();
            match self.input.peek() {
                None => return Err(ReaderError::UnbalancedParen),
                Some(&')') => {
                    self.input.next();
                    break;
                }
                Some(_) => elements.push(self.read()?),
            }
        }
        Ok(self.arena.alloc(Value::Vector(elements)))
    }

    fn read_atom(&mut self) -> ReaderResult {
        let mut token = String::new();
        while let Some(&c) = self.input.peek() {
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.input.next();
        }
        self.parse_atom(token)
    }

    fn parse_atom(&mut self, token: String) -> ReaderResult {
        if token.eq_ignore_ascii_case("nil") {
            return Ok(self.nil);
        }
        let first = token.chars().next().ok_or(ReaderError::UnexpectedEof)?;
        let looks_numeric = first.is_ascii_digit()
            || (matches!(first, '+' | '-' | '.') && token.chars().any(|c| c.is_ascii_digit()));
        if looks_numeric {
            if let Ok(n) = token.parse::<i64>() {
                return Ok(self.arena.alloc(Value::Integer(n)));
            }
            if let Ok(f) = token.parse::<f64>() {
                return Ok(self.arena.alloc(Value::Float(f)));
            }
            return Err(ReaderError::InvalidNumber(token));
        }
        let sym = self.symbols.intern(&token);
        Ok(self.arena.alloc(Value::Symbol(sym)))
    }
}

/// Read one form from `input` into the interpreter's heap
pub fn read_str(interp: &mut Interpreter, input: &str) -> ReaderResult {
    let nil = interp.nil;
    let mut reader = Reader::new(input, &mut interp.arena, &mut interp.symbols, nil);
    reader.read()
}

/// Read every form in `input`
pub fn read_all(interp: &mut Interpreter, input: &str) -> Result<Vec<ValueId>, ReaderError> {
    let nil = interp.nil;
    let mut reader = Reader::new(input, &mut interp.arena, &mut interp.symbols, nil);
    let mut forms = Vec::new();
    loop {
        match reader.read() {
            Ok(form) => forms.push(form),
            Err(ReaderError::UnexpectedEof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(forms)
}

/// Bridge a reader failure into a <parse-error> condition
pub fn parse_error_condition(interp: &mut Interpreter, input: &str) -> Signal {
    let string = interp.alloc(Value::String(input.to_string()));
    conditions::parse_error(
        &mut interp.arena,
        &mut interp.symbols,
        string,
        classes::OBJECT,
    )
}
