//! Token-based declaration and section parsing for WDL

use super::expressions::parse_expression;
use super::parser_utils::{expect_keyword, parse_identifier, parse_name, ParseResult};
use super::token_stream::TokenStream;
use super::tokens::Token;
use super::types::parse_type;
use crate::error::SourcePosition;
use crate::expr::Expression;
use crate::tree::Declaration;
use indexmap::IndexMap;

/// Parse a declaration: `Type name [= expr]`.
pub fn parse_declaration(stream: &mut TokenStream, id_prefix: &str) -> ParseResult<Declaration> {
    let start = stream.current_position();
    let decl_type = parse_type(stream)?;
    let name = parse_identifier(stream)?;
    let expr = if stream.try_consume(&Token::Assign).is_some() {
        Some(parse_expression(stream)?)
    } else {
        None
    };
    Ok(Declaration::new(
        stream.span_from(&start),
        decl_type,
        name,
        expr,
        id_prefix,
    ))
}

/// Parse `keyword { declarations }`, returning the section span and its
/// declarations
pub fn parse_declaration_section(
    stream: &mut TokenStream,
    keyword: &str,
    id_prefix: &str,
) -> ParseResult<(SourcePosition, Vec<Declaration>)> {
    let start = stream.current_position();
    expect_keyword(stream, keyword)?;
    stream.expect(Token::LeftBrace)?;

    let mut declarations = Vec::new();
    while stream.try_consume(&Token::RightBrace).is_none() {
        if stream.is_eof() {
            return Err(stream.error(format!("Unterminated {} section", keyword)));
        }
        declarations.push(parse_declaration(stream, id_prefix)?);
    }

    Ok((stream.span_from(&start), declarations))
}

/// Parse `keyword { key: expr ... }` as used by runtime, meta,
/// parameter_meta, requirements and hints sections. Entries may be separated
/// by commas or just whitespace.
pub fn parse_key_value_section(
    stream: &mut TokenStream,
    keyword: &str,
) -> ParseResult<IndexMap<String, Expression>> {
    expect_keyword(stream, keyword)?;
    stream.expect(Token::LeftBrace)?;

    let mut entries = IndexMap::new();
    while stream.try_consume(&Token::RightBrace).is_none() {
        if stream.is_eof() {
            return Err(stream.error(format!("Unterminated {} section", keyword)));
        }
        let key = parse_name(stream)?;
        stream.expect(Token::Colon)?;
        let value = parse_expression(stream)?;
        stream.try_consume(&Token::Comma);
        entries.insert(key, value);
    }

    Ok(entries)
}
