//! Solidity tokenizer.
//!
//! Produces the whole token stream up front; the parser backtracks by index.
//! Keywords are plain identifiers, the parser decides what they mean.

use crate::domain::errors::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// Digits as written, including hex and version-like `0.8.0`.
    Number(String),
    Str(String),
    HexStr(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    /// Byte range in the source.
    pub start: usize,
    pub end: usize,
}

/// Longest first.
const PUNCTUATION: [&str; 50] = [
    ">>>", "<<=", ">>=", "**", "++", "--", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "|=", "&=", "^=", "<<", ">>", "=>", "->", ":=", "(", ")", "{", "}", "[", "]", ";",
    ",", ".", "?", ":", "=", "+", "-", "*", "/", "%", "!", "~", "<", ">", "&", "|", "^", "@",
];

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0, line: 1, line_start: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column, start) = (self.line, self.column(), self.pos);
            let Some(b) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, line, column, start, end: start });
                return Ok(tokens);
            };
            let kind = if is_ident_start(b) {
                self.ident_or_prefixed_string()?
            } else if b.is_ascii_digit() {
                self.number()
            } else if b == b'"' || b == b'\'' {
                TokenKind::Str(self.string()?)
            } else {
                self.punct()?
            };
            tokens.push(Token { kind, line, column, start, end: self.pos });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn column(&self) -> usize {
        self.src[self.line_start..self.pos].chars().count() + 1
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column(), message)
    }

    /// Advances one character, tracking lines.
    fn bump(&mut self) {
        if let Some(c) = self.src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.line_start = self.pos;
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.bump(),
                (Some(b'/'), Some(b'/')) => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let (line, column) = (self.line, self.column());
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => self.bump(),
                            (None, _) => {
                                let message = "unterminated block comment";
                                return Err(ParseError::new(line, column, message));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn ident_or_prefixed_string(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        match (word, self.peek()) {
            ("hex", Some(b'"' | b'\'')) => Ok(TokenKind::HexStr(self.string()?)),
            ("unicode", Some(b'"' | b'\'')) => Ok(TokenKind::Str(self.string()?)),
            _ => Ok(TokenKind::Ident(word.to_string())),
        }
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => self.pos += 1,
                Some(b'.') if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.pos += 1,
                _ => break,
            }
        }
        TokenKind::Number(self.src[start..self.pos].to_string())
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let (line, column) = (self.line, self.column());
        let quote = self.peek().unwrap_or(b'"');
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(ParseError::new(line, column, "unterminated string literal"))
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b) if b == quote => {
                    let text = self.src[start..self.pos].to_string();
                    self.bump();
                    return Ok(text);
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn punct(&mut self) -> Result<TokenKind, ParseError> {
        let rest = &self.src[self.pos..];
        let symbol = PUNCTUATION.iter().find(|p| rest.starts_with(**p)).copied();
        match symbol {
            Some(symbol) => {
                self.pos += symbol.len();
                Ok(TokenKind::Punct(symbol))
            }
            None => {
                let c = rest.chars().next().unwrap_or('?');
                Err(self.error(format!("unexpected character `{c}`")))
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(src).tokenize()
}
