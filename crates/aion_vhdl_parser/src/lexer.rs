//! Lexical analyzer for VHDL-2008 source text.
//!
//! Converts source text into a sequence of [`Token`]s, handling case-insensitive
//! keywords, based literals, string/character/bit-string literals, block and line
//! comments, and extended identifiers. Errors are reported to the [`DiagnosticSink`]
//! and produce [`VhdlToken::Error`] tokens.

use crate::token::{lookup_keyword, Token, VhdlToken};
use aion_diagnostics::code::{Category, DiagnosticCode};
use aion_diagnostics::{Diagnostic, DiagnosticSink};
use aion_source::{FileId, Span};

/// Lexes the given source text into a vector of tokens.
///
/// Whitespace and comments are skipped. The returned vector always ends with
/// a [`VhdlToken::Eof`] token. Lexer errors are reported via the diagnostic
/// sink and produce [`VhdlToken::Error`] tokens in the output.
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        sink,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl<'a> Lexer<'a> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: VhdlToken::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        if self.pos < self.source.len() {
            self.source[self.pos]
        } else {
            0
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let idx = self.pos + offset;
        if idx < self.source.len() {
            self.source[idx]
        } else {
            0
        }
    }

    fn advance(&mut self) -> u8 {
        let b = self.source[self.pos];
        self.pos += 1;
        b
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, msg: &str, span: Span) {
        self.sink.emit(Diagnostic::error(
            DiagnosticCode::new(Category::Error, 100),
            msg,
            span,
        ));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            // Skip whitespace
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.source.len() {
                return;
            }
            // Line comment: --
            if self.peek() == b'-' && self.peek_at(1) == b'-' {
                self.pos += 2;
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            // Block comment: /* ... */ (VHDL-2008)
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                let mut depth = 1;
                while self.pos < self.source.len() && depth > 0 {
                    if self.source[self.pos] == b'/' && self.peek_at(1) == b'*' {
                        depth += 1;
                        self.pos += 2;
                    } else if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        depth -= 1;
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                if depth > 0 {
                    self.error("unterminated block comment", self.span_from(start));
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        // Character literal: 'X' (single character between single quotes)
        // Must check this before identifiers since tick is also used for attributes.
        // Character literal: exactly '<char>' where <char> is any printable char
        if b == b'\'' && self.pos + 2 < self.source.len() && self.source[self.pos + 2] == b'\'' {
            // Check that the next char after closing quote is not an identifier char
            // (to avoid matching things like 'a' in the middle of names)
            let after = if self.pos + 3 < self.source.len() {
                self.source[self.pos + 3]
            } else {
                0
            };
            if !is_ident_char(after) {
                self.pos += 3;
                return Token {
                    kind: VhdlToken::CharLiteral,
                    span: self.span_from(start),
                };
            }
        }

        // Identifiers and keywords
        if is_ident_start(b) {
            return self.lex_identifier_or_keyword(start);
        }

        // Extended identifier: \...\
        if b == b'\\' {
            return self.lex_extended_identifier(start);
        }

        // Numeric literals
        if b.is_ascii_digit() {
            return self.lex_number(start);
        }

        // String literal
        if b == b'"' {
            return self.lex_string(start);
        }

        // Bit string literal: B"...", O"...", X"...", etc.
        // Handled within lex_identifier_or_keyword for base prefixes

        // Operators and punctuation
        self.lex_operator(start)
    }

    fn lex_identifier_or_keyword(&mut self, start: usize) -> Token {
        while self.pos < self.source.len() && is_ident_char(self.source[self.pos]) {
            self.pos += 1;
        }

        let text = &self.source[start..self.pos];

        // Check for bit string literal prefix: B"...", O"...", X"...", etc.
        if self.pos < self.source.len() && self.source[self.pos] == b'"' && text.len() <= 2 {
            let lower: Vec<u8> = text.iter().map(|b| b.to_ascii_lowercase()).collect();
            let is_bit_prefix = matches!(
                lower.as_slice(),
                b"b" | b"o" | b"x" | b"ub" | b"uo" | b"ux" | b"sb" | b"so" | b"sx" | b"d"
            );
            if is_bit_prefix {
                // Consume the string part
                self.pos += 1; // skip opening "
                while self.pos < self.source.len() && self.source[self.pos] != b'"' {
                    if self.source[self.pos] == b'\n' {
                        self.error("unterminated bit string literal", self.span_from(start));
                        return Token {
                            kind: VhdlToken::Error,
                            span: self.span_from(start),
                        };
                    }
                    self.pos += 1;
                }
                if self.pos < self.source.len() {
                    self.pos += 1; // skip closing "
                }
                return Token {
                    kind: VhdlToken::BitStringLiteral,
                    span: self.span_from(start),
                };
            }
        }

        // Lowercase for keyword lookup
        let mut lower_buf = [0u8; 64];
        let len = text.len().min(64);
        for (i, &ch) in text[..len].iter().enumerate() {
            lower_buf[i] = ch.to_ascii_lowercase();
        }
        let lower = std::str::from_utf8(&lower_buf[..len]).unwrap_or("");

        let kind = if let Some(kw) = lookup_keyword(lower) {
            kw
        } else {
            VhdlToken::Identifier
        };

        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_extended_identifier(&mut self, start: usize) -> Token {
        self.pos += 1; // skip opening backslash
        while self.pos < self.source.len() {
            if self.source[self.pos] == b'\\' {
                // Check for escaped backslash: \\
                if self.peek_at(1) == b'\\' {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1; // skip closing backslash
                return Token {
                    kind: VhdlToken::ExtendedIdentifier,
                    span: self.span_from(start),
                };
            }
            if self.source[self.pos] == b'\n' {
                break;
            }
            self.pos += 1;
        }
        self.error("unterminated extended identifier", self.span_from(start));
        Token {
            kind: VhdlToken::Error,
            span: self.span_from(start),
        }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        // Consume digits (and underscores)
        self.eat_digits();

        // Check for based literal: digits#...#
        if self.pos < self.source.len() && self.source[self.pos] == b'#' {
            self.pos += 1; // skip #
                           // Consume based digits (hex + underscores + optional dot)
            while self.pos < self.source.len() {
                let ch = self.source[self.pos];
                if ch.is_ascii_hexdigit() || ch == b'_' || ch == b'.' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            // Expect closing #
            if self.pos < self.source.len() && self.source[self.pos] == b'#' {
                self.pos += 1;
            } else {
                self.error(
                    "expected closing '#' in based literal",
                    self.span_from(start),
                );
                return Token {
                    kind: VhdlToken::Error,
                    span: self.span_from(start),
                };
            }
            // Optional exponent
            self.eat_exponent();
            // Determine if integer or real based on presence of '.'
            let text = &self.source[start..self.pos];
            let kind = if text.contains(&b'.') {
                VhdlToken::RealLiteral
            } else {
                VhdlToken::IntLiteral
            };
            return Token {
                kind,
                span: self.span_from(start),
            };
        }

        // Check for real literal: digits.digits
        if self.pos < self.source.len()
            && self.source[self.pos] == b'.'
            && self.peek_at(1).is_ascii_digit()
        {
            self.pos += 1; // skip .
            self.eat_digits();
            self.eat_exponent();
            return Token {
                kind: VhdlToken::RealLiteral,
                span: self.span_from(start),
            };
        }

        // Optional exponent for integer
        self.eat_exponent();

        Token {
            kind: VhdlToken::IntLiteral,
            span: self.span_from(start),
        }
    }

    fn eat_digits(&mut self) {
        while self.pos < self.source.len() {
            let ch = self.source[self.pos];
            if ch.is_ascii_digit() || ch == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn eat_exponent(&mut self) {
        if self.pos < self.source.len()
            && (self.source[self.pos] == b'e' || self.source[self.pos] == b'E')
        {
            self.pos += 1;
            if self.pos < self.source.len()
                && (self.source[self.pos] == b'+' || self.source[self.pos] == b'-')
            {
                self.pos += 1;
            }
            self.eat_digits();
        }
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1; // skip opening "
        loop {
            if self.pos >= self.source.len() || self.source[self.pos] == b'\n' {
                self.error("unterminated string literal", self.span_from(start));
                return Token {
                    kind: VhdlToken::Error,
                    span: self.span_from(start),
                };
            }
            if self.source[self.pos] == b'"' {
                // Check for escaped quote: ""
                if self.peek_at(1) == b'"' {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1; // skip closing "
                return Token {
                    kind: VhdlToken::StringLiteral,
                    span: self.span_from(start),
                };
            }
            self.pos += 1;
        }
    }

    fn lex_operator(&mut self, start: usize) -> Token {
        let b = self.advance();
        let kind = match b {
            b'(' => VhdlToken::LeftParen,
            b')' => VhdlToken::RightParen,
            b',' => VhdlToken::Comma,
            b';' => VhdlToken::Semicolon,
            b':' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    VhdlToken::ColonEquals
                } else {
                    VhdlToken::Colon
                }
            }
            b'<' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    VhdlToken::LessEquals
                } else if self.peek() == b'<' {
                    self.pos += 1;
                    VhdlToken::DoubleLess
                } else {
                    VhdlToken::LessThan
                }
            }
            b'>' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    VhdlToken::GreaterEquals
                } else if self.peek() == b'>' {
                    self.pos += 1;
                    VhdlToken::DoubleGreater
                } else {
                    VhdlToken::GreaterThan
                }
            }
            b'=' => {
                if self.peek() == b'>' {
                    self.pos += 1;
                    VhdlToken::Arrow
                } else {
                    VhdlToken::Equals
                }
            }
            b'/' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    VhdlToken::SlashEquals
                } else {
                    VhdlToken::Slash
                }
            }
            b'*' => {
                if self.peek() == b'*' {
                    self.pos += 1;
                    VhdlToken::DoubleStar
                } else {
                    VhdlToken::Star
                }
            }
            b'+' => VhdlToken::Plus,
            b'-' => VhdlToken::Minus,
            b'&' => VhdlToken::Ampersand,
            b'|' => VhdlToken::Bar,
            b'\'' => VhdlToken::Tick,
            b'.' => VhdlToken::Dot,
            b'^' => VhdlToken::Caret,
            b'@' => VhdlToken::At,
            b'?' => match self.peek() {
                b'=' => {
                    self.pos += 1;
                    VhdlToken::MatchEquals
                }
                b'/' => {
                    if self.peek_at(1) == b'=' {
                        self.pos += 2;
                        VhdlToken::MatchSlashEquals
                    } else {
                        self.error("unexpected character after '?/'", self.span_from(start));
                        VhdlToken::Error
                    }
                }
                b'<' => {
                    self.pos += 1;
                    if self.peek() == b'=' {
                        self.pos += 1;
                        VhdlToken::MatchLessEquals
                    } else {
                        VhdlToken::MatchLess
                    }
                }
                b'>' => {
                    self.pos += 1;
                    if self.peek() == b'=' {
                        self.pos += 1;
                        VhdlToken::MatchGreaterEquals
                    } else {
                        VhdlToken::MatchGreater
                    }
                }
                b'?' => {
                    self.pos += 1;
                    VhdlToken::ConditionOp
                }
                _ => {
                    self.error("unexpected character after '?'", self.span_from(start));
                    VhdlToken::Error
                }
            },
            _ => {
                self.error(
                    &format!("unrecognized character '{}'", b as char),
                    self.span_from(start),
                );
                VhdlToken::Error
            }
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
