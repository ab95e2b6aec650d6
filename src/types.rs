//! WDL type annotations as they appear on declarations.
//!
//! Types are carried structurally so that declarations can be rendered back
//! to source and so the docker scanner can check that an image variable is a
//! `String`. No type checking or coercion happens here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A declared WDL type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Boolean { optional: bool },
    Int { optional: bool },
    Float { optional: bool },
    String { optional: bool },
    File { optional: bool },
    Directory { optional: bool },
    Object { optional: bool },

    /// Array type, parameterized by item type
    Array {
        item_type: Box<Type>,
        optional: bool,
        nonempty: bool,
    },

    /// Map type, parameterized by key and value types
    Map {
        key_type: Box<Type>,
        value_type: Box<Type>,
        optional: bool,
    },

    /// Pair type, parameterized by left and right types
    Pair {
        left_type: Box<Type>,
        right_type: Box<Type>,
        optional: bool,
    },

    /// Reference to a struct defined in this or an imported document
    StructInstance { type_name: String, optional: bool },
}

impl Type {
    pub fn string(optional: bool) -> Self {
        Type::String { optional }
    }

    pub fn array(item_type: Type, optional: bool, nonempty: bool) -> Self {
        Type::Array {
            item_type: Box::new(item_type),
            optional,
            nonempty,
        }
    }

    /// Whether the type carries the `?` quantifier
    pub fn is_optional(&self) -> bool {
        match self {
            Type::Boolean { optional }
            | Type::Int { optional }
            | Type::Float { optional }
            | Type::String { optional }
            | Type::File { optional }
            | Type::Directory { optional }
            | Type::Object { optional }
            | Type::Array { optional, .. }
            | Type::Map { optional, .. }
            | Type::Pair { optional, .. }
            | Type::StructInstance { optional, .. } => *optional,
        }
    }

    /// Return a copy with the `?` quantifier set as requested
    pub fn with_optional(mut self, value: bool) -> Self {
        match &mut self {
            Type::Boolean { optional }
            | Type::Int { optional }
            | Type::Float { optional }
            | Type::String { optional }
            | Type::File { optional }
            | Type::Directory { optional }
            | Type::Object { optional }
            | Type::Array { optional, .. }
            | Type::Map { optional, .. }
            | Type::Pair { optional, .. }
            | Type::StructInstance { optional, .. } => *optional = value,
        }
        self
    }

    /// True for `String` and `String?`
    pub fn is_string(&self) -> bool {
        matches!(self, Type::String { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base_str = match self {
            Type::Boolean { .. } => "Boolean".to_string(),
            Type::Int { .. } => "Int".to_string(),
            Type::Float { .. } => "Float".to_string(),
            Type::String { .. } => "String".to_string(),
            Type::File { .. } => "File".to_string(),
            Type::Directory { .. } => "Directory".to_string(),
            Type::Object { .. } => "Object".to_string(),
            Type::Array {
                item_type,
                nonempty,
                ..
            } => format!("Array[{}]{}", item_type, if *nonempty { "+" } else { "" }),
            Type::Map {
                key_type,
                value_type,
                ..
            } => format!("Map[{}, {}]", key_type, value_type),
            Type::Pair {
                left_type,
                right_type,
                ..
            } => format!("Pair[{}, {}]", left_type, right_type),
            Type::StructInstance { type_name, .. } => type_name.clone(),
        };
        if self.is_optional() {
            write!(f, "{}?", base_str)
        } else {
            write!(f, "{}", base_str)
        }
    }
}
