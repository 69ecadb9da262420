// Copyright 2023 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A forward-only, pull-based JSON lexer.
//!
//! The scanner knows nothing about paths. It hands out one token per call and
//! can discard a whole value without looking at its content.

use std::fmt::{Display, Formatter};

use crate::extract::{Error, Result};

/// The kind of a token produced by [`Scanner::token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// A string. The raw bytes are the content between the quotes.
    String,
    /// A number, without exponent.
    Number,
    /// `true` or `false`.
    Boolean,
    /// `null`
    Null,
    /// A run of bytes the scanner does not recognize.
    Unknown,
    /// End of input.
    End,
}

impl TokenKind {
    /// Returns true for strings, numbers, booleans and null.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::String | Self::Number | Self::Boolean | Self::Null
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartObject => write!(f, "StartObject"),
            Self::EndObject => write!(f, "EndObject"),
            Self::StartArray => write!(f, "StartArray"),
            Self::EndArray => write!(f, "EndArray"),
            Self::String => write!(f, "String"),
            Self::Number => write!(f, "Number"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Null => write!(f, "Null"),
            Self::Unknown => write!(f, "Unknown"),
            Self::End => write!(f, "End"),
        }
    }
}

/// A single token and the bytes it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw bytes of the token.
    ///
    /// Strings exclude the quotes and keep escapes as written. Structural
    /// tokens carry the single punctuation byte, `End` is empty.
    pub raw: &'a [u8],
    /// Byte offset of the token in the input.
    pub position: usize,
}

/// A cursor over a JSON byte buffer.
///
/// Cloning a scanner is cheap and yields an independent cursor at the same
/// position, which is how callers look ahead.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    /// Advances by `n` bytes without running past the end of the input.
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// Returns true if another element follows in the current object or array.
    pub fn more(&mut self) -> bool {
        self.skip_whitespace();
        matches!(self.peek(), Some(c) if c != b'}' && c != b']')
    }

    /// Reads the next token.
    pub fn token(&mut self) -> Token<'a> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                // separators are never surfaced
                Some(b',' | b':') => self.pos += 1,
                _ => break,
            }
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return self.emit(TokenKind::End, start);
        };
        match c {
            b'"' => {
                // an unterminated string runs to the end of the input
                let end = if self.skip_string() {
                    self.pos - 1
                } else {
                    self.pos
                };
                Token {
                    kind: TokenKind::String,
                    raw: &self.data[start + 1..end],
                    position: start,
                }
            }
            b'{' => {
                self.pos += 1;
                self.emit(TokenKind::StartObject, start)
            }
            b'}' => {
                self.pos += 1;
                self.emit(TokenKind::EndObject, start)
            }
            b'[' => {
                self.pos += 1;
                self.emit(TokenKind::StartArray, start)
            }
            b']' => {
                self.pos += 1;
                self.emit(TokenKind::EndArray, start)
            }
            // literals are recognized by their first byte only
            b'n' => {
                self.advance(4);
                self.emit(TokenKind::Null, start)
            }
            b't' => {
                self.advance(4);
                self.emit(TokenKind::Boolean, start)
            }
            b'f' => {
                self.advance(5);
                self.emit(TokenKind::Boolean, start)
            }
            b'-' | b'0'..=b'9' => {
                self.pos += 1;
                while let Some(b'0'..=b'9' | b'.') = self.peek() {
                    self.pos += 1;
                }
                self.emit(TokenKind::Number, start)
            }
            _ => {
                while let Some(c) = self.peek() {
                    if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b',' | b'}' | b']') {
                        break;
                    }
                    self.pos += 1;
                }
                self.emit(TokenKind::Unknown, start)
            }
        }
    }

    fn emit(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            raw: &self.data[start..self.pos],
            position: start,
        }
    }

    /// Moves past a string starting at the current position, quotes included.
    ///
    /// Returns false if the input ends before the closing quote.
    fn skip_string(&mut self) -> bool {
        // opening quote
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                b'"' => {
                    self.pos += 1;
                    return true;
                }
                b'\\' => self.advance(2),
                _ => self.pos += 1,
            }
        }
        false
    }

    /// Discards exactly one value at the current position.
    ///
    /// Scalars are consumed as a single token. Objects and arrays are matched
    /// by depth, ignoring braces and brackets that appear inside strings.
    pub fn skip_value(&mut self) {
        let token = self.token();
        if !matches!(token.kind, TokenKind::StartObject | TokenKind::StartArray) {
            return;
        }
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                b'"' => {
                    self.skip_string();
                }
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Reads a string token, failing on anything else.
    pub fn expect_string(&mut self) -> Result<Token<'a>> {
        self.expect(TokenKind::String)
    }

    /// Reads the `}` closing the current object.
    pub fn expect_end_object(&mut self) -> Result<()> {
        self.expect(TokenKind::EndObject).map(|_| ())
    }

    /// Reads the `]` closing the current array.
    pub fn expect_end_array(&mut self) -> Result<()> {
        self.expect(TokenKind::EndArray).map(|_| ())
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token<'a>> {
        let token = self.token();
        if token.kind != expected {
            return Err(Error::UnexpectedToken {
                expected,
                found: token.kind,
                position: token.position,
            });
        }
        Ok(token)
    }
}
