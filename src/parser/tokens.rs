//! Token definitions for WDL parser

use crate::error::SourcePosition;
use crate::expr::StringPart;
use std::fmt;

/// Token type for WDL lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Keyword(String),

    // Identifiers
    Identifier(String),

    // Literals
    IntLiteral(i64),
    /// Float literal kept as written
    FloatLiteral(String),
    BoolLiteral(bool),
    StringLiteral {
        parts: Vec<StringPart>,
        quote: char,
    },

    /// Text following the `version` keyword
    Version(String),

    /// Body of a `command` section, delimiters excluded
    CommandBody(String),

    // Operators - Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Operators - Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Operators - Logical
    And,
    Or,
    Not,

    // Operators - Assignment
    Assign,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // Punctuation
    Comma,
    Dot,
    Colon,
    Question,
}

impl Token {
    /// True for the given reserved word
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Keyword(kw) if kw == word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "keyword '{}'", kw),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::IntLiteral(n) => write!(f, "{}", n),
            Token::FloatLiteral(text) => write!(f, "{}", text),
            Token::BoolLiteral(b) => write!(f, "{}", b),
            Token::StringLiteral { .. } => write!(f, "string literal"),
            Token::Version(v) => write!(f, "version {}", v),
            Token::CommandBody(_) => write!(f, "command body"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Equal => write!(f, "'=='"),
            Token::NotEqual => write!(f, "'!='"),
            Token::Less => write!(f, "'<'"),
            Token::LessEqual => write!(f, "'<='"),
            Token::Greater => write!(f, "'>'"),
            Token::GreaterEqual => write!(f, "'>='"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
            Token::Not => write!(f, "'!'"),
            Token::Assign => write!(f, "'='"),
            Token::LeftParen => write!(f, "'('"),
            Token::RightParen => write!(f, "')'"),
            Token::LeftBracket => write!(f, "'['"),
            Token::RightBracket => write!(f, "']'"),
            Token::LeftBrace => write!(f, "'{{'"),
            Token::RightBrace => write!(f, "'}}'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Colon => write!(f, "':'"),
            Token::Question => write!(f, "'?'"),
        }
    }
}

/// Token with its source position and byte range in the document
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub pos: SourcePosition,
    /// Byte offset of the first character
    pub offset: usize,
    /// Byte offset just past the last character
    pub end_offset: usize,
}

impl LocatedToken {
    pub fn new(token: Token, pos: SourcePosition, offset: usize, end_offset: usize) -> Self {
        Self {
            token,
            pos,
            offset,
            end_offset,
        }
    }
}
