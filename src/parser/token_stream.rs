//! Token stream for parsing WDL

use super::lexer::tokenize;
use super::tokens::{LocatedToken, Token};
use crate::error::{SourcePosition, WdlError};

/// A stream of tokens with lookahead and backtracking
#[derive(Debug, Clone)]
pub struct TokenStream {
    source: String,
    uri: String,
    abspath: String,
    tokens: Vec<LocatedToken>,
    token_position: usize,
    declared_version: Option<String>,
}

impl TokenStream {
    /// Tokenize `source` and create a stream over it
    pub fn new(source: &str, uri: &str, abspath: &str) -> Result<Self, WdlError> {
        let tokens = tokenize(source, uri, abspath)?;
        Ok(TokenStream {
            source: source.to_string(),
            uri: uri.to_string(),
            abspath: abspath.to_string(),
            tokens,
            token_position: 0,
            declared_version: None,
        })
    }

    /// Record the version declared by the document, for error messages
    pub fn set_declared_version(&mut self, version: &str) {
        self.declared_version = Some(version.to_string());
    }

    pub fn declared_version(&self) -> Option<&str> {
        self.declared_version.as_deref()
    }

    /// The full source text being parsed
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Peek at the current token without consuming it
    pub fn peek(&self) -> Option<&LocatedToken> {
        self.tokens.get(self.token_position)
    }

    /// Peek at the nth token ahead without consuming
    pub fn peek_ahead(&self, n: usize) -> Option<&LocatedToken> {
        self.tokens.get(self.token_position + n)
    }

    /// Get the current token type
    pub fn peek_token(&self) -> Option<Token> {
        self.peek().map(|t| t.token.clone())
    }

    /// True if the current token is the given keyword
    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().map_or(false, |t| t.token.is_keyword(keyword))
    }

    /// Consume and return the current token
    pub fn next(&mut self) -> Option<LocatedToken> {
        let token = self.tokens.get(self.token_position).cloned();
        if token.is_some() {
            self.token_position += 1;
        }
        token
    }

    /// Check if we're at the end of the stream
    pub fn is_eof(&self) -> bool {
        self.token_position >= self.tokens.len()
    }

    /// Get the current position in the token stream
    pub fn position(&self) -> usize {
        self.token_position
    }

    /// Set the position in the token stream (for backtracking)
    pub fn set_position(&mut self, pos: usize) {
        if pos <= self.tokens.len() {
            self.token_position = pos;
        }
    }

    /// Build a syntax error at the current token
    pub fn error(&self, message: String) -> WdlError {
        WdlError::syntax_error(
            self.current_position(),
            message,
            self.declared_version.clone(),
        )
    }

    /// Consume a specific token type, returning an error if it doesn't match
    pub fn expect(&mut self, expected: Token) -> Result<LocatedToken, WdlError> {
        match self.peek() {
            Some(located) if located.token == expected => {
                let located = located.clone();
                self.token_position += 1;
                Ok(located)
            }
            Some(located) => Err(self.error(format!(
                "Expected {}, found {}",
                expected, located.token
            ))),
            None => Err(self.error(format!("Expected {}, found end of input", expected))),
        }
    }

    /// Try to consume a specific token type
    pub fn try_consume(&mut self, expected: &Token) -> Option<LocatedToken> {
        match self.peek() {
            Some(located) if located.token == *expected => self.next(),
            _ => None,
        }
    }

    /// Get the source position of the current token
    pub fn current_position(&self) -> SourcePosition {
        if let Some(token) = self.peek() {
            token.pos.clone()
        } else if let Some(last) = self.tokens.last() {
            let mut pos = last.pos.clone();
            pos.line = pos.end_line;
            pos.column = pos.end_column;
            pos
        } else {
            SourcePosition::new(self.uri.clone(), self.abspath.clone(), 1, 1, 1, 1)
        }
    }

    /// Position of the most recently consumed token
    pub fn last_position(&self) -> SourcePosition {
        match self.token_position.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.pos.clone(),
            None => self.current_position(),
        }
    }

    /// Span from `start` through the most recently consumed token
    pub fn span_from(&self, start: &SourcePosition) -> SourcePosition {
        start.span_to(&self.last_position())
    }

    /// Source text from token index `start` through the most recently
    /// consumed token
    pub fn source_since(&self, start: usize) -> &str {
        let begin = self.tokens.get(start).map(|t| t.offset);
        let end = self
            .token_position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.end_offset);
        match (begin, end) {
            (Some(b), Some(e)) if b <= e => &self.source[b..e],
            _ => "",
        }
    }
}
