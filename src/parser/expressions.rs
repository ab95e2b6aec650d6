//! Token-based expression parsing for WDL
//!
//! Precedence climbing over the binary operators, with unary operators,
//! postfix member/index access and the literal forms as primaries

use super::parser_utils::{expect_keyword, parse_delimited_list, parse_name, ParseResult};
use super::token_stream::TokenStream;
use super::tokens::Token;
use crate::expr::{BinaryOperator, Expression, UnaryOperator};

/// Parse a complete expression
pub fn parse_expression(stream: &mut TokenStream) -> ParseResult<Expression> {
    if stream.peek_keyword("if") {
        return parse_if_then_else(stream);
    }
    parse_binary(stream, 1)
}

fn parse_if_then_else(stream: &mut TokenStream) -> ParseResult<Expression> {
    let start = stream.current_position();
    expect_keyword(stream, "if")?;
    let condition = parse_expression(stream)?;
    expect_keyword(stream, "then")?;
    let true_expr = parse_expression(stream)?;
    expect_keyword(stream, "else")?;
    let false_expr = parse_expression(stream)?;
    Ok(Expression::IfThenElse {
        pos: stream.span_from(&start),
        condition: Box::new(condition),
        true_expr: Box::new(true_expr),
        false_expr: Box::new(false_expr),
    })
}

fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    let op = match token {
        Token::Or => BinaryOperator::Or,
        Token::And => BinaryOperator::And,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::Less => BinaryOperator::Less,
        Token::LessEqual => BinaryOperator::LessEqual,
        Token::Greater => BinaryOperator::Greater,
        Token::GreaterEqual => BinaryOperator::GreaterEqual,
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Star => BinaryOperator::Multiply,
        Token::Slash => BinaryOperator::Divide,
        Token::Percent => BinaryOperator::Modulo,
        _ => return None,
    };
    Some(op)
}

fn parse_binary(stream: &mut TokenStream, min_precedence: u8) -> ParseResult<Expression> {
    let mut left = parse_unary(stream)?;

    loop {
        let op = match stream.peek().and_then(|t| binary_operator(&t.token)) {
            Some(op) if op.precedence() >= min_precedence => op,
            _ => break,
        };
        stream.next();
        let right = if stream.peek_keyword("if") {
            parse_if_then_else(stream)?
        } else {
            parse_binary(stream, op.precedence() + 1)?
        };
        left = Expression::BinaryOp {
            pos: left.pos().span_to(right.pos()),
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn parse_unary(stream: &mut TokenStream) -> ParseResult<Expression> {
    let op = match stream.peek_token() {
        Some(Token::Not) => UnaryOperator::Not,
        Some(Token::Minus) => UnaryOperator::Negate,
        _ => return parse_postfix(stream),
    };
    let start = stream.current_position();
    stream.next();
    let operand = parse_unary(stream)?;
    Ok(Expression::UnaryOp {
        pos: start.span_to(operand.pos()),
        op,
        operand: Box::new(operand),
    })
}

fn parse_postfix(stream: &mut TokenStream) -> ParseResult<Expression> {
    let mut expr = parse_primary(stream)?;

    loop {
        match stream.peek_token() {
            Some(Token::LeftBracket) => {
                stream.next();
                let index = parse_expression(stream)?;
                stream.expect(Token::RightBracket)?;
                expr = Expression::Get {
                    pos: stream.span_from(expr.pos()),
                    expr: Box::new(expr),
                    index: Box::new(index),
                };
            }
            Some(Token::Dot) => {
                stream.next();
                let member = parse_name(stream)?;
                expr = Expression::Member {
                    pos: stream.span_from(expr.pos()),
                    expr: Box::new(expr),
                    member,
                };
            }
            _ => break,
        }
    }

    Ok(expr)
}

fn parse_member_entry(stream: &mut TokenStream) -> ParseResult<(String, Expression)> {
    let name = parse_name(stream)?;
    stream.expect(Token::Colon)?;
    Ok((name, parse_expression(stream)?))
}

fn parse_map_entry(stream: &mut TokenStream) -> ParseResult<(Expression, Expression)> {
    let key = parse_expression(stream)?;
    stream.expect(Token::Colon)?;
    Ok((key, parse_expression(stream)?))
}

fn parse_primary(stream: &mut TokenStream) -> ParseResult<Expression> {
    let start = stream.current_position();
    let token = match stream.peek_token() {
        Some(token) => token,
        None => return Err(stream.error("Expected expression, found end of input".to_string())),
    };

    match token {
        Token::IntLiteral(value) => {
            stream.next();
            Ok(Expression::Int { pos: start, value })
        }
        Token::FloatLiteral(text) => {
            let value = text
                .parse::<f64>()
                .map_err(|_| stream.error(format!("Invalid float literal {}", text)))?;
            stream.next();
            Ok(Expression::Float {
                pos: start,
                value,
                text,
            })
        }
        Token::BoolLiteral(value) => {
            stream.next();
            Ok(Expression::Boolean { pos: start, value })
        }
        Token::StringLiteral { parts, quote } => {
            stream.next();
            Ok(Expression::String {
                pos: start,
                parts,
                quote,
            })
        }
        Token::Keyword(kw) if kw == "None" => {
            stream.next();
            Ok(Expression::Null { pos: start })
        }
        Token::Keyword(kw) if kw == "if" => parse_if_then_else(stream),
        Token::Keyword(kw) if kw == "object" => {
            stream.next();
            let members = parse_delimited_list(
                stream,
                Token::LeftBrace,
                Token::RightBrace,
                Token::Comma,
                parse_member_entry,
            )?;
            Ok(Expression::Struct {
                pos: stream.span_from(&start),
                type_name: None,
                members,
            })
        }
        Token::LeftParen => {
            stream.next();
            let first = parse_expression(stream)?;
            if stream.try_consume(&Token::Comma).is_some() {
                let second = parse_expression(stream)?;
                stream.expect(Token::RightParen)?;
                Ok(Expression::Pair {
                    pos: stream.span_from(&start),
                    left: Box::new(first),
                    right: Box::new(second),
                })
            } else {
                stream.expect(Token::RightParen)?;
                Ok(first)
            }
        }
        Token::LeftBracket => {
            let items = parse_delimited_list(
                stream,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                parse_expression,
            )?;
            Ok(Expression::Array {
                pos: stream.span_from(&start),
                items,
            })
        }
        Token::LeftBrace => {
            let pairs = parse_delimited_list(
                stream,
                Token::LeftBrace,
                Token::RightBrace,
                Token::Comma,
                parse_map_entry,
            )?;
            Ok(Expression::Map {
                pos: stream.span_from(&start),
                pairs,
            })
        }
        Token::Identifier(name) => {
            stream.next();
            match stream.peek_token() {
                Some(Token::LeftParen) => {
                    let arguments = parse_delimited_list(
                        stream,
                        Token::LeftParen,
                        Token::RightParen,
                        Token::Comma,
                        parse_expression,
                    )?;
                    Ok(Expression::Apply {
                        pos: stream.span_from(&start),
                        function_name: name,
                        arguments,
                    })
                }
                Some(Token::LeftBrace) if is_struct_literal(stream) => {
                    let members = parse_delimited_list(
                        stream,
                        Token::LeftBrace,
                        Token::RightBrace,
                        Token::Comma,
                        parse_member_entry,
                    )?;
                    Ok(Expression::Struct {
                        pos: stream.span_from(&start),
                        type_name: Some(name),
                        members,
                    })
                }
                _ => Ok(Expression::Ident { pos: start, name }),
            }
        }
        other => Err(stream.error(format!("Expected expression, found {}", other))),
    }
}

/// `Name { member: ... }` or `Name {}` directly after an identifier.
fn is_struct_literal(stream: &TokenStream) -> bool {
    match (stream.peek_ahead(1), stream.peek_ahead(2)) {
        (Some(next), _) if next.token == Token::RightBrace => true,
        (Some(name), Some(colon)) => {
            matches!(name.token, Token::Identifier(_) | Token::Keyword(_))
                && colon.token == Token::Colon
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expression {
        let mut stream = TokenStream::new(source, "test.wdl", "/test.wdl").unwrap();
        let expr = parse_expression(&mut stream).unwrap();
        assert!(stream.is_eof(), "trailing tokens in {}", source);
        expr
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 == 7 && !done");
        assert_eq!(expr.to_string(), "1 + 2 * 3 == 7 && !done");
        match expr {
            Expression::BinaryOp { op, .. } => assert_eq!(op, BinaryOperator::And),
            other => panic!("unexpected {:?}", other),
        }

        let grouped = parse("(1 + 2) * 3");
        assert_eq!(grouped.to_string(), "(1 + 2) * 3");
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("[1, 2, 3,]").to_string(), "[1, 2, 3]");
        assert_eq!(parse("(1, \"a\")").to_string(), "(1, \"a\")");
        assert_eq!(parse("{\"a\": 1}").to_string(), "{\"a\": 1}");
        assert_eq!(parse("object { a: 1, b: None }").to_string(), "object { a: 1, b: None }");
        assert_eq!(parse("Sample { id: \"x\" }").to_string(), "Sample { id: \"x\" }");
        assert_eq!(parse("1.50").to_string(), "1.50");
    }

    #[test]
    fn test_apply_member_and_index() {
        let expr = parse("select_first([sample.bam, fallback])[0].left");
        assert_eq!(expr.to_string(), "select_first([sample.bam, fallback])[0].left");
        assert!(matches!(expr, Expression::Member { .. }));
    }

    #[test]
    fn test_if_then_else() {
        let expr = parse("if defined(x) then x else \"default\"");
        assert_eq!(expr.to_string(), "if defined(x) then x else \"default\"");
    }

    #[test]
    fn test_string_literal_position() {
        let expr = parse("\"us.gcr.io/broad-gatk/gatk:4.2.0.0\"");
        assert_eq!(
            expr.string_literal().as_deref(),
            Some("us.gcr.io/broad-gatk/gatk:4.2.0.0")
        );
        assert_eq!((expr.pos().column, expr.pos().end_column), (1, 36));
    }

    #[test]
    fn test_identifier_followed_by_block_is_not_struct() {
        // a body element after a declaration value
        let mut stream =
            TokenStream::new("flag\n{ x }", "test.wdl", "/test.wdl").unwrap();
        let expr = parse_expression(&mut stream).unwrap();
        assert_eq!(expr.ident_name(), Some("flag"));
        assert_eq!(stream.peek_token(), Some(Token::LeftBrace));
    }
}
