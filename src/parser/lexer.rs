//! Stateful lexer for WDL parsing

use super::keywords::is_keyword;
use super::tokens::{LocatedToken, Token};
use crate::error::{SourcePosition, WdlError};
use crate::expr::StringPart;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::many0_count,
    sequence::{pair, preceded, terminated, tuple},
    IResult, InputTake,
};
use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

/// Lexer mode for context-aware tokenization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    /// Normal WDL code
    Normal,
    /// Right after the `version` keyword
    Version,
    /// Right after the `command` keyword
    Command,
}

/// Stateful lexer for WDL
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    uri: String,
    abspath: String,
    mode: LexerMode,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, uri: &str, abspath: &str) -> Self {
        Self {
            source,
            uri: uri.to_string(),
            abspath: abspath.to_string(),
            mode: LexerMode::Normal,
        }
    }

    /// Get the current lexer mode
    pub fn current_mode(&self) -> LexerMode {
        self.mode
    }

    fn position(&self, start: &Span, end: &Span) -> SourcePosition {
        SourcePosition::new(
            self.uri.clone(),
            self.abspath.clone(),
            start.location_line(),
            start.get_utf8_column() as u32,
            end.location_line(),
            end.get_utf8_column() as u32,
        )
    }

    fn next_token(&self, input: Span<'a>) -> IResult<Span<'a>, Token> {
        match self.mode {
            LexerMode::Normal => normal_token(input),
            LexerMode::Version => alt((version_string, normal_token))(input),
            LexerMode::Command => alt((command_body, normal_token))(input),
        }
    }

    fn unexpected(&self, input: &Span) -> WdlError {
        let message = match input.fragment().chars().next() {
            Some('"') | Some('\'') => "Unterminated string literal".to_string(),
            Some(c) if self.mode == LexerMode::Command && (c == '{' || c == '<') => {
                "Unterminated command section".to_string()
            }
            Some(c) => format!("Unexpected character '{}'", c),
            None => "Unexpected end of input".to_string(),
        };
        let pos = self.position(input, input);
        WdlError::syntax_error(pos, message, None)
    }

    /// Tokenize the whole source, dropping whitespace and comments
    pub fn tokenize(mut self) -> Result<Vec<LocatedToken>, WdlError> {
        let mut input = Span::new(self.source);
        let mut tokens = Vec::new();

        loop {
            let (rest, _) = trivia(input).map_err(|_| self.unexpected(&input))?;
            input = rest;
            if input.fragment().is_empty() {
                break;
            }

            let (rest, token) = self
                .next_token(input)
                .map_err(|_| self.unexpected(&input))?;

            self.mode = match &token {
                Token::Keyword(kw) if kw == "version" => LexerMode::Version,
                Token::Keyword(kw) if kw == "command" => LexerMode::Command,
                _ => LexerMode::Normal,
            };

            let pos = self.position(&input, &rest);
            tokens.push(LocatedToken::new(
                token,
                pos,
                input.location_offset(),
                rest.location_offset(),
            ));
            input = rest;
        }

        Ok(tokens)
    }
}

/// Tokenize a source text into located tokens
pub fn tokenize(source: &str, uri: &str, abspath: &str) -> Result<Vec<LocatedToken>, WdlError> {
    Lexer::new(source, uri, abspath).tokenize()
}

// Basic token parsers

/// Parse a comment
pub fn comment(input: Span) -> IResult<Span, Span> {
    preceded(char('#'), take_while(|c: char| c != '\n' && c != '\r'))(input)
}

/// Skip whitespace, newlines and comments
pub fn trivia(input: Span) -> IResult<Span, ()> {
    value(
        (),
        many0_count(alt((value((), multispace1), value((), comment)))),
    )(input)
}

/// Parse an integer literal (positive only, minus handled as separate token)
pub fn int_literal(input: Span) -> IResult<Span, Token> {
    map_res(digit1, |s: Span| {
        s.fragment().parse::<i64>().map(Token::IntLiteral)
    })(input)
}

fn exponent(input: Span) -> IResult<Span, Span> {
    recognize(tuple((
        alt((char('e'), char('E'))),
        opt(alt((char('+'), char('-')))),
        digit1,
    )))(input)
}

/// Parse a float literal (positive only, minus handled as separate token)
pub fn float_literal(input: Span) -> IResult<Span, Token> {
    map(
        alt((
            recognize(tuple((digit1, char('.'), opt(digit1), opt(exponent)))),
            recognize(tuple((char('.'), digit1, opt(exponent)))),
            recognize(pair(digit1, exponent)),
        )),
        |s: Span| Token::FloatLiteral(s.fragment().to_string()),
    )(input)
}

/// Parse an identifier, keyword or boolean literal
pub fn word(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |s: Span| match *s.fragment() {
            "true" => Token::BoolLiteral(true),
            "false" => Token::BoolLiteral(false),
            w if is_keyword(w) => Token::Keyword(w.to_string()),
            w => Token::Identifier(w.to_string()),
        },
    )(input)
}

/// Parse operators and punctuation
pub fn operator(input: Span) -> IResult<Span, Token> {
    alt((
        alt((
            value(Token::Equal, tag("==")),
            value(Token::NotEqual, tag("!=")),
            value(Token::LessEqual, tag("<=")),
            value(Token::GreaterEqual, tag(">=")),
            value(Token::And, tag("&&")),
            value(Token::Or, tag("||")),
        )),
        alt((
            value(Token::Less, char('<')),
            value(Token::Greater, char('>')),
            value(Token::Assign, char('=')),
            value(Token::Not, char('!')),
            value(Token::Plus, char('+')),
            value(Token::Minus, char('-')),
            value(Token::Star, char('*')),
            value(Token::Slash, char('/')),
            value(Token::Percent, char('%')),
        )),
        alt((
            value(Token::LeftParen, char('(')),
            value(Token::RightParen, char(')')),
            value(Token::LeftBracket, char('[')),
            value(Token::RightBracket, char(']')),
            value(Token::LeftBrace, char('{')),
            value(Token::RightBrace, char('}')),
            value(Token::Comma, char(',')),
            value(Token::Dot, char('.')),
            value(Token::Colon, char(':')),
            value(Token::Question, char('?')),
        )),
    ))(input)
}

/// Byte length of a placeholder body, starting just past its opening brace.
/// Braces inside quoted strings do not count.
fn placeholder_len(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a string literal (single or double quoted) with placeholders
pub fn string_literal(input: Span) -> IResult<Span, Token> {
    let text = *input.fragment();
    let quote = match text.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char))),
    };
    let unterminated = || nom::Err::Failure(NomError::new(input, ErrorKind::Eof));

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut i = 1;

    while let Some(c) = text[i..].chars().next() {
        match c {
            '\\' => {
                let escaped_len = text[i + 1..].chars().next().map_or(0, |n| n.len_utf8());
                current.push_str(&text[i..i + 1 + escaped_len]);
                i += 1 + escaped_len;
            }
            '~' | '$' if text[i + 1..].starts_with('{') => {
                let body_start = i + 2;
                let len = placeholder_len(&text[body_start..]).ok_or_else(unterminated)?;
                if !current.is_empty() {
                    parts.push(StringPart::Text(std::mem::take(&mut current)));
                }
                parts.push(StringPart::Placeholder {
                    sigil: c,
                    raw: text[body_start..body_start + len].to_string(),
                });
                i = body_start + len + 1;
            }
            '\n' => return Err(unterminated()),
            c if c == quote => {
                if !current.is_empty() {
                    parts.push(StringPart::Text(current));
                }
                let (rest, _) = input.take_split(i + 1);
                return Ok((rest, Token::StringLiteral { parts, quote }));
            }
            c => {
                current.push(c);
                i += c.len_utf8();
            }
        }
    }

    Err(unterminated())
}

/// Parse the version number following `version`
pub fn version_string(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphanumeric()),
            take_while(|c: char| !c.is_whitespace()),
        )),
        |s: Span| Token::Version(s.fragment().to_string()),
    )(input)
}

fn heredoc_command(input: Span) -> IResult<Span, Token> {
    map(
        terminated(preceded(tag("<<<"), take_until(">>>")), tag(">>>")),
        |s: Span| Token::CommandBody(s.fragment().to_string()),
    )(input)
}

fn brace_command(input: Span) -> IResult<Span, Token> {
    let (after_open, _) = char('{')(input)?;
    let text = *after_open.fragment();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("~{") || rest.starts_with("${") {
            let len = placeholder_len(&rest[2..])
                .ok_or_else(|| nom::Err::Failure(NomError::new(input, ErrorKind::Eof)))?;
            i += 2 + len + 1;
        } else if rest.starts_with('}') {
            let (after, body) = after_open.take_split(i);
            let (after, _) = char('}')(after)?;
            return Ok((after, Token::CommandBody(body.fragment().to_string())));
        } else {
            i += rest.chars().next().map_or(1, |c| c.len_utf8());
        }
    }

    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Eof)))
}

/// Parse a command section body, `{ ... }` or `<<< ... >>>`.
pub fn command_body(input: Span) -> IResult<Span, Token> {
    alt((heredoc_command, brace_command))(input)
}

/// Parse one token in normal mode
pub fn normal_token(input: Span) -> IResult<Span, Token> {
    alt((string_literal, float_literal, int_literal, word, operator))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source, "test.wdl", "/test.wdl")
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let tokens = kinds("x = 1 + 2.5 # trailing comment\ny");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("x".to_string()),
                Token::Assign,
                Token::IntLiteral(1),
                Token::Plus,
                Token::FloatLiteral("2.5".to_string()),
                Token::Identifier("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_version_is_kept_verbatim() {
        let tokens = kinds("version 1.0\ntask");
        assert_eq!(tokens[1], Token::Version("1.0".to_string()));
        assert_eq!(tokens[2], Token::Keyword("task".to_string()));
    }

    #[test]
    fn test_string_with_placeholder() {
        let tokens = kinds(r#""repo/img:~{tag}" 'plain'"#);
        assert_eq!(
            tokens[0],
            Token::StringLiteral {
                parts: vec![
                    StringPart::Text("repo/img:".to_string()),
                    StringPart::Placeholder {
                        sigil: '~',
                        raw: "tag".to_string()
                    },
                ],
                quote: '"',
            }
        );
        assert_eq!(
            tokens[1],
            Token::StringLiteral {
                parts: vec![StringPart::Text("plain".to_string())],
                quote: '\'',
            }
        );
    }

    #[test]
    fn test_command_bodies() {
        let tokens = kinds("command <<<\n  echo ~{x} }\n>>> runtime");
        assert_eq!(tokens[1], Token::CommandBody("\n  echo ~{x} }\n".to_string()));
        assert_eq!(tokens[2], Token::Keyword("runtime".to_string()));

        let tokens = kinds("command {\n  echo ${sep=' ' xs}\n}");
        assert_eq!(
            tokens[1],
            Token::CommandBody("\n  echo ${sep=' ' xs}\n".to_string())
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  docker: \"img\"", "t.wdl", "/t.wdl").unwrap();
        let docker = &tokens[1];
        assert_eq!((docker.pos.line, docker.pos.column), (2, 3));
        assert_eq!((docker.pos.end_line, docker.pos.end_column), (2, 9));
        let literal = &tokens[3];
        assert_eq!((literal.pos.column, literal.pos.end_column), (11, 16));
        assert_eq!(literal.pos.abspath, "/t.wdl");
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = \"abc\n", "t.wdl", "/t.wdl").unwrap_err();
        assert!(err.to_string().contains("Unterminated string literal"));
    }
}
