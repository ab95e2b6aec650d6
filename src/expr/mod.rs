//! WDL expressions composing literal values, arithmetic, comparison, conditionals,
//! string interpolation, arrays & maps, and function applications.
//!
//! Expressions are kept purely syntactic. They are never evaluated; the patcher
//! only needs to recognize literals, follow identifier references and render
//! guards back to WDL source (for example `if (defined(x))` conditions shown in
//! the call tree).

use crate::error::SourcePosition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// WDL expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Boolean literal (true/false)
    Boolean { pos: SourcePosition, value: bool },

    /// Integer literal
    Int { pos: SourcePosition, value: i64 },

    /// Float literal, with the source spelling kept for rendering
    Float {
        pos: SourcePosition,
        value: f64,
        text: String,
    },

    /// String literal (may contain placeholders)
    String {
        pos: SourcePosition,
        parts: Vec<StringPart>,
        quote: char,
    },

    /// Null literal (None in WDL)
    Null { pos: SourcePosition },

    /// Array literal [item1, item2, ...]
    Array {
        pos: SourcePosition,
        items: Vec<Expression>,
    },

    /// Pair literal (left, right)
    Pair {
        pos: SourcePosition,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Map literal {key1: value1, key2: value2, ...}
    Map {
        pos: SourcePosition,
        pairs: Vec<(Expression, Expression)>,
    },

    /// Object or struct literal: `object { a: 1 }` or `Name { a: 1 }`.
    Struct {
        pos: SourcePosition,
        type_name: Option<String>,
        members: Vec<(String, Expression)>,
    },

    /// Variable identifier reference
    Ident { pos: SourcePosition, name: String },

    /// Member access: expr.member.
    Member {
        pos: SourcePosition,
        expr: Box<Expression>,
        member: String,
    },

    /// Array/map access: expr[index].
    Get {
        pos: SourcePosition,
        expr: Box<Expression>,
        index: Box<Expression>,
    },

    /// Conditional expression: if condition then true_expr else false_expr.
    IfThenElse {
        pos: SourcePosition,
        condition: Box<Expression>,
        true_expr: Box<Expression>,
        false_expr: Box<Expression>,
    },

    /// Function application: function_name(arg1, arg2, ...).
    Apply {
        pos: SourcePosition,
        function_name: String,
        arguments: Vec<Expression>,
    },

    /// Binary operations: +, -, *, /, %, ==, !=, <, <=, >, >=, &&, ||
    BinaryOp {
        pos: SourcePosition,
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operations: !, -
    UnaryOp {
        pos: SourcePosition,
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

/// Parts of a string literal (literal text or placeholder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringPart {
    /// Literal text, escapes left as written
    Text(String),
    /// Placeholder `~{...}` or `${...}`; `raw` is the source between the braces.
    Placeholder { sigil: char, raw: String },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 3,
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 4,
            BinaryOperator::Add | BinaryOperator::Subtract => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

impl Expression {
    /// Get the source position of this expression
    pub fn pos(&self) -> &SourcePosition {
        match self {
            Expression::Boolean { pos, .. }
            | Expression::Int { pos, .. }
            | Expression::Float { pos, .. }
            | Expression::String { pos, .. }
            | Expression::Null { pos }
            | Expression::Array { pos, .. }
            | Expression::Pair { pos, .. }
            | Expression::Map { pos, .. }
            | Expression::Struct { pos, .. }
            | Expression::Ident { pos, .. }
            | Expression::Member { pos, .. }
            | Expression::Get { pos, .. }
            | Expression::IfThenElse { pos, .. }
            | Expression::Apply { pos, .. }
            | Expression::BinaryOp { pos, .. }
            | Expression::UnaryOp { pos, .. } => pos,
        }
    }

    /// Text of a string literal without placeholders, quotes stripped
    pub fn string_literal(&self) -> Option<String> {
        match self {
            Expression::String { parts, .. } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StringPart::Text(t) => text.push_str(t),
                        StringPart::Placeholder { .. } => return None,
                    }
                }
                Some(text)
            }
            _ => None,
        }
    }

    /// Name of a bare identifier reference
    pub fn ident_name(&self) -> Option<&str> {
        match self {
            Expression::Ident { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short description of the expression kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Boolean { .. } => "Boolean literal",
            Expression::Int { .. } => "Int literal",
            Expression::Float { .. } => "Float literal",
            Expression::String { parts, .. } => {
                if parts
                    .iter()
                    .any(|p| matches!(p, StringPart::Placeholder { .. }))
                {
                    "interpolated string"
                } else {
                    "string literal"
                }
            }
            Expression::Null { .. } => "None literal",
            Expression::Array { .. } => "array literal",
            Expression::Pair { .. } => "pair literal",
            Expression::Map { .. } => "map literal",
            Expression::Struct { .. } => "struct literal",
            Expression::Ident { .. } => "identifier",
            Expression::Member { .. } => "member access",
            Expression::Get { .. } => "index access",
            Expression::IfThenElse { .. } => "if-then-else",
            Expression::Apply { .. } => "function application",
            Expression::BinaryOp { .. } => "binary operation",
            Expression::UnaryOp { .. } => "unary operation",
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        let needs_parens = match self {
            Expression::BinaryOp { op, .. } => {
                op.precedence() < parent || (right && op.precedence() == parent)
            }
            Expression::IfThenElse { .. } => true,
            _ => false,
        };
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for StringPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringPart::Text(text) => write!(f, "{}", text),
            StringPart::Placeholder { sigil, raw } => write!(f, "{}{{{}}}", sigil, raw),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Boolean { value, .. } => write!(f, "{}", value),
            Expression::Int { value, .. } => write!(f, "{}", value),
            Expression::Float { text, .. } => write!(f, "{}", text),
            Expression::String { parts, quote, .. } => {
                write!(f, "{}", quote)?;
                for part in parts {
                    write!(f, "{}", part)?;
                }
                write!(f, "{}", quote)
            }
            Expression::Null { .. } => write!(f, "None"),
            Expression::Array { items, .. } => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::Pair { left, right, .. } => write!(f, "({}, {})", left, right),
            Expression::Map { pairs, .. } => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expression::Struct {
                type_name, members, ..
            } => {
                match type_name {
                    Some(name) => write!(f, "{} {{", name)?,
                    None => write!(f, "object {{")?,
                }
                for (i, (k, v)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", k, v)?;
                }
                write!(f, " }}")
            }
            Expression::Ident { name, .. } => write!(f, "{}", name),
            Expression::Member { expr, member, .. } => {
                expr.fmt_operand(f, u8::MAX, false)?;
                write!(f, ".{}", member)
            }
            Expression::Get { expr, index, .. } => {
                expr.fmt_operand(f, u8::MAX, false)?;
                write!(f, "[{}]", index)
            }
            Expression::IfThenElse {
                condition,
                true_expr,
                false_expr,
                ..
            } => write!(f, "if {} then {} else {}", condition, true_expr, false_expr),
            Expression::Apply {
                function_name,
                arguments,
                ..
            } => {
                write!(f, "{}(", function_name)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expression::BinaryOp {
                op, left, right, ..
            } => {
                left.fmt_operand(f, op.precedence(), false)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_operand(f, op.precedence(), true)
            }
            Expression::UnaryOp { op, operand, .. } => {
                match op {
                    UnaryOperator::Not => write!(f, "!")?,
                    UnaryOperator::Negate => write!(f, "-")?,
                }
                operand.fmt_operand(f, u8::MAX, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pos() -> SourcePosition {
        SourcePosition::new("test.wdl".to_string(), "test.wdl".to_string(), 1, 1, 1, 1)
    }

    fn ident(name: &str) -> Expression {
        Expression::Ident {
            pos: test_pos(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_string_literal_detection() {
        let plain = Expression::String {
            pos: test_pos(),
            parts: vec![StringPart::Text("repo/img:1.0".to_string())],
            quote: '"',
        };
        assert_eq!(plain.string_literal(), Some("repo/img:1.0".to_string()));
        assert_eq!(plain.to_string(), "\"repo/img:1.0\"");

        let interpolated = Expression::String {
            pos: test_pos(),
            parts: vec![
                StringPart::Text("repo/img:".to_string()),
                StringPart::Placeholder {
                    sigil: '~',
                    raw: "version".to_string(),
                },
            ],
            quote: '"',
        };
        assert_eq!(interpolated.string_literal(), None);
        assert_eq!(interpolated.kind_name(), "interpolated string");
        assert_eq!(interpolated.to_string(), "\"repo/img:~{version}\"");
    }

    #[test]
    fn test_binary_rendering_keeps_grouping() {
        // (a || b) && !c
        let expr = Expression::BinaryOp {
            pos: test_pos(),
            op: BinaryOperator::And,
            left: Box::new(Expression::BinaryOp {
                pos: test_pos(),
                op: BinaryOperator::Or,
                left: Box::new(ident("a")),
                right: Box::new(ident("b")),
            }),
            right: Box::new(Expression::UnaryOp {
                pos: test_pos(),
                op: UnaryOperator::Not,
                operand: Box::new(ident("c")),
            }),
        };
        assert_eq!(expr.to_string(), "(a || b) && !c");
    }

    #[test]
    fn test_apply_and_member_rendering() {
        let expr = Expression::Apply {
            pos: test_pos(),
            function_name: "defined".to_string(),
            arguments: vec![Expression::Member {
                pos: test_pos(),
                expr: Box::new(ident("align")),
                member: "bam".to_string(),
            }],
        };
        assert_eq!(expr.to_string(), "defined(align.bam)");
    }
}
