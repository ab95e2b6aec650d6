//! Parser utility functions for token-based parsing

use super::token_stream::TokenStream;
use super::tokens::Token;
use crate::error::WdlError;

/// Parse result type
pub type ParseResult<T> = Result<T, WdlError>;

/// Try to parse with backtracking on failure
pub fn try_parse<T, F>(stream: &mut TokenStream, parser: F) -> Option<T>
where
    F: FnOnce(&mut TokenStream) -> ParseResult<T>,
{
    let pos = stream.position();
    match parser(stream) {
        Ok(result) => Some(result),
        Err(_) => {
            stream.set_position(pos);
            None
        }
    }
}

/// Parse a list of items enclosed in delimiters, allowing a trailing separator
pub fn parse_delimited_list<T, F>(
    stream: &mut TokenStream,
    open: Token,
    close: Token,
    separator: Token,
    parser: F,
) -> ParseResult<Vec<T>>
where
    F: Fn(&mut TokenStream) -> ParseResult<T>,
{
    stream.expect(open)?;

    let mut items = Vec::new();

    // Check for empty list
    if stream.try_consume(&close).is_some() {
        return Ok(items);
    }

    items.push(parser(stream)?);

    while stream.peek_token() != Some(close.clone()) {
        stream.expect(separator.clone())?;

        // Allow trailing separator
        if stream.peek_token() == Some(close.clone()) {
            break;
        }

        items.push(parser(stream)?);
    }

    stream.expect(close)?;
    Ok(items)
}

/// Expect a specific keyword
pub fn expect_keyword(stream: &mut TokenStream, keyword: &str) -> ParseResult<()> {
    if stream.peek_keyword(keyword) {
        stream.next();
        Ok(())
    } else {
        Err(stream.error(format!("Expected keyword '{}'", keyword)))
    }
}

/// Parse an identifier
pub fn parse_identifier(stream: &mut TokenStream) -> ParseResult<String> {
    match stream.peek_token() {
        Some(Token::Identifier(name)) => {
            stream.next();
            Ok(name)
        }
        Some(other) => Err(stream.error(format!("Expected identifier, found {}", other))),
        None => Err(stream.error("Expected identifier, found end of input".to_string())),
    }
}

/// Parse a name where reserved words are also acceptable: member names and
/// keys of meta/runtime sections.
pub fn parse_name(stream: &mut TokenStream) -> ParseResult<String> {
    match stream.peek_token() {
        Some(Token::Identifier(name)) | Some(Token::Keyword(name)) => {
            stream.next();
            Ok(name)
        }
        _ => Err(stream.error("Expected name".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(source, "test.wdl", "/test.wdl").unwrap()
    }

    #[test]
    fn test_try_parse() {
        let mut stream = stream("foo bar");

        let result = try_parse(&mut stream, parse_identifier);
        assert_eq!(result, Some("foo".to_string()));

        // Failed parse (not at '+')
        let result = try_parse(&mut stream, |s| s.expect(Token::Plus).map(|_| ()));
        assert!(result.is_none());

        assert_eq!(parse_identifier(&mut stream).unwrap(), "bar");
    }

    #[test]
    fn test_parse_delimited_list() {
        let mut stream = stream("[a, b, c,]");

        let result = parse_delimited_list(
            &mut stream,
            Token::LeftBracket,
            Token::RightBracket,
            Token::Comma,
            parse_identifier,
        )
        .unwrap();

        assert_eq!(result, vec!["a", "b", "c"]);
        assert!(stream.is_eof());
    }

    #[test]
    fn test_parse_name_accepts_keywords() {
        let mut stream = stream("input left");
        assert!(parse_identifier(&mut stream.clone()).is_err());
        assert_eq!(parse_name(&mut stream).unwrap(), "input");
        assert_eq!(parse_name(&mut stream).unwrap(), "left");
        assert!(expect_keyword(&mut stream, "task").is_err());
    }
}
