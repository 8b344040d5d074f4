//! Hand-written scanner: one pass over the source text producing a flat
//! token vector terminated by `TokenKind::Eof`. Grounded in
//! `original_source/stmc/source/core/Lexer.cpp` for the character-class
//! dispatch and escape handling; the buffered char-stream abstraction the
//! teacher's own lexer used has been dropped in favor of a plain
//! `Peekable<Chars>` since this scanner has no need for multi-token
//! lookahead or backtracking.

use statim_common::{SourcePos, SourceSpan};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;
use thiserror::Error;

use crate::token::{keyword, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {span}")]
    UnexpectedChar { ch: char, span: SourceSpan },
    #[error("unterminated string literal starting at {span}")]
    UnterminatedString { span: SourceSpan },
    #[error("unterminated character literal starting at {span}")]
    UnterminatedChar { span: SourceSpan },
    #[error("empty character literal at {span}")]
    EmptyChar { span: SourceSpan },
    #[error("invalid escape sequence '\\{ch}' at {span}")]
    InvalidEscape { ch: char, span: SourceSpan },
    #[error("malformed numeric literal '{text}' at {span}")]
    MalformedNumber { text: String, span: SourceSpan },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    file: Arc<str>,
    chars: Peekable<Chars<'a>>,
    pos: SourcePos,
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<Arc<str>>, source: &'a str) -> Self {
        Self { file: file.into(), chars: source.chars().peekable(), pos: SourcePos::start() }
    }

    /// Scans the whole input into a token vector, ending with `Eof`.
    pub fn tokenize(mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, SourceSpan::point(self.file.clone(), start)));
                break;
            };

            let kind = if is_ident_start(ch) {
                self.scan_identifier_or_keyword()
            } else if ch.is_ascii_digit() {
                self.scan_number()?
            } else if ch == '"' {
                self.scan_string()?
            } else if ch == '\'' {
                self.scan_char()?
            } else {
                self.scan_operator()?
            };

            let span = SourceSpan::new(self.file.clone(), start, self.pos);
            tokens.push(Token::new(kind, span));
        }
        Ok(tokens)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        self.pos.offset += ch.len_utf8() as u32;
        Some(ch)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek().is_none() || (self.peek() == Some('*') && self.peek2() == Some('/'))) {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        keyword(&text).unwrap_or(TokenKind::Identifier(text))
    }

    fn scan_number(&mut self) -> LexResult<TokenKind> {
        let start = self.pos;
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            text.push(self.advance().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push(self.advance().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.advance().unwrap());
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }

        if is_float {
            Ok(TokenKind::FloatLiteral(text))
        } else {
            text.parse::<u64>().map(TokenKind::IntLiteral).map_err(|_| LexError::MalformedNumber {
                text,
                span: SourceSpan::new(self.file.clone(), start, self.pos),
            })
        }
    }

    fn scan_escape(&mut self, start: SourcePos) -> LexResult<char> {
        let ch = self.advance().ok_or(LexError::UnterminatedString { span: SourceSpan::point(self.file.clone(), start) })?;
        Ok(match ch {
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            '0' => '\0',
            other => {
                return Err(LexError::InvalidEscape { ch: other, span: SourceSpan::new(self.file.clone(), start, self.pos) })
            }
        })
    }

    fn scan_string(&mut self) -> LexResult<TokenKind> {
        let start = self.pos;
        self.advance(); // opening '"'
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString { span: SourceSpan::new(self.file.clone(), start, self.pos) })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.scan_escape(start)?);
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::StringLiteral(value))
    }

    fn scan_char(&mut self) -> LexResult<TokenKind> {
        let start = self.pos;
        self.advance(); // opening '\''
        let value = match self.peek() {
            Some('\'') => return Err(LexError::EmptyChar { span: SourceSpan::new(self.file.clone(), start, self.pos) }),
            Some('\\') => {
                self.advance();
                self.scan_escape(start)?
            }
            Some(c) => {
                self.advance();
                c
            }
            None => return Err(LexError::UnterminatedChar { span: SourceSpan::point(self.file.clone(), start) }),
        };
        if !self.bump_if('\'') {
            return Err(LexError::UnterminatedChar { span: SourceSpan::new(self.file.clone(), start, self.pos) });
        }
        Ok(TokenKind::CharLiteral(value))
    }

    fn scan_operator(&mut self) -> LexResult<TokenKind> {
        let start = self.pos;
        let ch = self.advance().unwrap();
        Ok(match ch {
            '+' => TokenKind::Plus,
            '-' => {
                if self.bump_if('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '&' => {
                if self.bump_if('&') {
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.bump_if('|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '!' => {
                if self.bump_if('=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.bump_if('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '<' => {
                if self.bump_if('<') {
                    TokenKind::Shl
                } else if self.bump_if('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.bump_if('>') {
                    TokenKind::Shr
                } else if self.bump_if('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            other => {
                return Err(LexError::UnexpectedChar { ch: other, span: SourceSpan::new(self.file.clone(), start, self.pos) })
            }
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_start(c)
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_continue(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new("test.stm", src).tokenize().unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn scans_function_signature() {
        let kinds = kinds("func add(a: i32, b: i32) -> i32 {}");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KeywordFunc,
                TokenKind::Identifier("add".into()),
                TokenKind::LParen,
                TokenKind::Identifier("a".into()),
                TokenKind::Colon,
                TokenKind::Identifier("i32".into()),
                TokenKind::Comma,
                TokenKind::Identifier("b".into()),
                TokenKind::Colon,
                TokenKind::Identifier("i32".into()),
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Identifier("i32".into()),
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_operators_longest_match_first() {
        let kinds = kinds("<< <= < >> >= > && || == !=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Shl,
                TokenKind::LtEq,
                TokenKind::Lt,
                TokenKind::Shr,
                TokenKind::GtEq,
                TokenKind::Gt,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_escape() {
        let kinds = kinds(r#""a\nb""#);
        assert_eq!(kinds, vec![TokenKind::StringLiteral("a\nb".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn skips_line_and_block_comments() {
        let kinds = kinds("// comment\n/* block */ 42");
        assert_eq!(kinds, vec![TokenKind::IntLiteral(42), TokenKind::Eof]);
    }

    #[test]
    fn rejects_unterminated_string() {
        let result = Lexer::new("test.stm", "\"abc").tokenize();
        assert!(matches!(result, Err(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn scans_float_literal() {
        let kinds = kinds("3.14 1e10");
        assert_eq!(kinds, vec![TokenKind::FloatLiteral("3.14".into()), TokenKind::FloatLiteral("1e10".into()), TokenKind::Eof]);
    }
}
