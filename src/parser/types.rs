//! Token-based type parsing for WDL

use super::parser_utils::ParseResult;
use super::token_stream::TokenStream;
use super::tokens::Token;
use crate::types::Type;

/// True if the current token can start a type
pub fn starts_type(stream: &TokenStream) -> bool {
    match stream.peek_token() {
        Some(Token::Keyword(kw)) => matches!(
            kw.as_str(),
            "Array"
                | "Map"
                | "Pair"
                | "String"
                | "Int"
                | "Float"
                | "Boolean"
                | "File"
                | "Directory"
                | "Object"
        ),
        Some(Token::Identifier(_)) => true,
        _ => false,
    }
}

/// Parse a type with its `+` and `?` quantifiers
pub fn parse_type(stream: &mut TokenStream) -> ParseResult<Type> {
    let base = match stream.peek_token() {
        Some(Token::Keyword(kw)) => {
            stream.next();
            match kw.as_str() {
                "String" => Type::String { optional: false },
                "Int" => Type::Int { optional: false },
                "Float" => Type::Float { optional: false },
                "Boolean" => Type::Boolean { optional: false },
                "File" => Type::File { optional: false },
                "Directory" => Type::Directory { optional: false },
                "Object" => Type::Object { optional: false },
                "Array" => {
                    stream.expect(Token::LeftBracket)?;
                    let item_type = parse_type(stream)?;
                    stream.expect(Token::RightBracket)?;
                    let nonempty = stream.try_consume(&Token::Plus).is_some();
                    Type::array(item_type, false, nonempty)
                }
                "Map" => {
                    let (key_type, value_type) = parse_type_pair(stream)?;
                    Type::Map {
                        key_type: Box::new(key_type),
                        value_type: Box::new(value_type),
                        optional: false,
                    }
                }
                "Pair" => {
                    let (left_type, right_type) = parse_type_pair(stream)?;
                    Type::Pair {
                        left_type: Box::new(left_type),
                        right_type: Box::new(right_type),
                        optional: false,
                    }
                }
                other => return Err(stream.error(format!("Unknown type {}", other))),
            }
        }
        Some(Token::Identifier(name)) => {
            stream.next();
            Type::StructInstance {
                type_name: name,
                optional: false,
            }
        }
        _ => return Err(stream.error("Expected type".to_string())),
    };

    let optional = stream.try_consume(&Token::Question).is_some();
    Ok(base.with_optional(optional))
}

fn parse_type_pair(stream: &mut TokenStream) -> ParseResult<(Type, Type)> {
    stream.expect(Token::LeftBracket)?;
    let first = parse_type(stream)?;
    stream.expect(Token::Comma)?;
    let second = parse_type(stream)?;
    stream.expect(Token::RightBracket)?;
    Ok((first, second))
}
