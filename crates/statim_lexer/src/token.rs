//! Token definitions for the statim language.

use serde::{Deserialize, Serialize};
use statim_common::Spanned;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    IntLiteral(u64),
    FloatLiteral(String), // kept as text: f64 has no Eq/Hash
    CharLiteral(char),
    StringLiteral(String),
    Identifier(String),

    // Keywords
    KeywordFunc,
    KeywordVar,
    KeywordIf,
    KeywordElse,
    KeywordWhile,
    KeywordBreak,
    KeywordContinue,
    KeywordReturn,
    KeywordStruct,
    KeywordEnum,
    KeywordAlias,
    KeywordLoad,
    KeywordAsm,
    KeywordMut,
    KeywordTrue,
    KeywordFalse,
    KeywordNull,
    KeywordSizeof,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    AmpAmp,
    PipePipe,
    Eq,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Arrow,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLiteral(n) => write!(f, "{n}"),
            TokenKind::FloatLiteral(s) => write!(f, "{s}"),
            TokenKind::CharLiteral(c) => write!(f, "'{c}'"),
            TokenKind::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenKind::Identifier(name) => write!(f, "{name}"),
            TokenKind::KeywordFunc => write!(f, "func"),
            TokenKind::KeywordVar => write!(f, "var"),
            TokenKind::KeywordIf => write!(f, "if"),
            TokenKind::KeywordElse => write!(f, "else"),
            TokenKind::KeywordWhile => write!(f, "while"),
            TokenKind::KeywordBreak => write!(f, "break"),
            TokenKind::KeywordContinue => write!(f, "continue"),
            TokenKind::KeywordReturn => write!(f, "return"),
            TokenKind::KeywordStruct => write!(f, "struct"),
            TokenKind::KeywordEnum => write!(f, "enum"),
            TokenKind::KeywordAlias => write!(f, "alias"),
            TokenKind::KeywordLoad => write!(f, "load"),
            TokenKind::KeywordAsm => write!(f, "asm"),
            TokenKind::KeywordMut => write!(f, "mut"),
            TokenKind::KeywordTrue => write!(f, "true"),
            TokenKind::KeywordFalse => write!(f, "false"),
            TokenKind::KeywordNull => write!(f, "null"),
            TokenKind::KeywordSizeof => write!(f, "sizeof"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Tilde => write!(f, "~"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Shl => write!(f, "<<"),
            TokenKind::Shr => write!(f, ">>"),
            TokenKind::AmpAmp => write!(f, "&&"),
            TokenKind::PipePipe => write!(f, "||"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::BangEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, "<eof>"),
        }
    }
}

pub type Token = Spanned<TokenKind>;

pub fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "func" => TokenKind::KeywordFunc,
        "var" => TokenKind::KeywordVar,
        "if" => TokenKind::KeywordIf,
        "else" => TokenKind::KeywordElse,
        "while" => TokenKind::KeywordWhile,
        "break" => TokenKind::KeywordBreak,
        "continue" => TokenKind::KeywordContinue,
        "return" => TokenKind::KeywordReturn,
        "struct" => TokenKind::KeywordStruct,
        "enum" => TokenKind::KeywordEnum,
        "alias" => TokenKind::KeywordAlias,
        "load" => TokenKind::KeywordLoad,
        "asm" => TokenKind::KeywordAsm,
        "mut" => TokenKind::KeywordMut,
        "true" => TokenKind::KeywordTrue,
        "false" => TokenKind::KeywordFalse,
        "null" => TokenKind::KeywordNull,
        "sizeof" => TokenKind::KeywordSizeof,
        _ => return None,
    })
}

pub trait TokenExt {
    fn is_literal(&self) -> bool;
    fn is_eof(&self) -> bool;
}

impl TokenExt for Token {
    fn is_literal(&self) -> bool {
        matches!(
            self.value,
            TokenKind::IntLiteral(_)
                | TokenKind::FloatLiteral(_)
                | TokenKind::CharLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::KeywordTrue
                | TokenKind::KeywordFalse
                | TokenKind::KeywordNull
        )
    }

    fn is_eof(&self) -> bool {
        matches!(self.value, TokenKind::Eof)
    }
}

