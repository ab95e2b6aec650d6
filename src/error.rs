//! Error types and source position tracking.
//!
//! Every fatal condition of the loader, the call graph builder and the patch
//! engine is a [`WdlError`]. Advisory conditions are logged instead and never
//! reach this type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Source position information for AST nodes and errors.
///
/// Contains both the original URI/filename and resolved absolute path,
/// along with one-based line and column positions. `end_column` points one
/// past the last character of the construct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// The filename/URI passed to load or import (may be relative)
    pub uri: String,
    /// The absolute filename/URI after path resolution
    pub abspath: String,
    /// One-based line number where the construct starts
    pub line: u32,
    /// One-based column number where the construct starts
    pub column: u32,
    /// One-based line number where the construct ends
    pub end_line: u32,
    /// One-based column number just past the end of the construct
    pub end_column: u32,
}

impl SourcePosition {
    pub fn new(
        uri: String,
        abspath: String,
        line: u32,
        column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            uri,
            abspath,
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Position covering `self` through the end of `end`
    pub fn span_to(&self, end: &SourcePosition) -> SourcePosition {
        SourcePosition {
            uri: self.uri.clone(),
            abspath: self.abspath.clone(),
            line: self.line,
            column: self.column,
            end_line: end.end_line,
            end_column: end.end_column,
        }
    }

    /// `line-end_line`, the form used in reports
    pub fn line_range(&self) -> String {
        format!("{}-{}", self.line, self.end_line)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.abspath, self.line, self.column)
    }
}

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum WdlError {
    /// Failure to lex/parse a WDL document
    #[error("Syntax error at {pos}: {message}")]
    Syntax {
        pos: SourcePosition,
        message: String,
        declared_wdl_version: Option<String>,
    },

    /// Failure to open/retrieve a WDL document or one of its imports
    #[error("Import error at {pos}: {message}")]
    Import {
        pos: SourcePosition,
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Document parses but is structurally unusable
    #[error("Validation error at {pos}: {message}")]
    Validation { pos: SourcePosition, message: String },

    /// Call target cannot be resolved to a task or workflow
    #[error("No such task/workflow: {name} (called at {pos})")]
    NoSuchTask { pos: SourcePosition, name: String },

    /// A node shape that cannot occupy the position it was found in
    #[error("Unexpected node at {pos}: expected {expected}, found {found}")]
    UnexpectedNode {
        pos: SourcePosition,
        expected: String,
        found: String,
    },

    /// The runtime docker attribute of a task has an unsupported shape
    #[error("Cannot classify docker attribute of task {task} at {pos}: {message}")]
    DockerClassification {
        pos: SourcePosition,
        task: String,
        message: String,
    },

    /// Graph, digest or patch bookkeeping disagrees with itself
    #[error("Consistency error: {message}")]
    Consistency { message: String },

    /// Malformed docker hint file
    #[error("Docker hint error: {message}")]
    Hint { message: String },

    /// Malformed configuration file
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filesystem failure outside of document loading
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl WdlError {
    /// Get the source position for this error, if available
    pub fn source_position(&self) -> Option<&SourcePosition> {
        match self {
            WdlError::Syntax { pos, .. } => Some(pos),
            WdlError::Import { pos, .. } => Some(pos),
            WdlError::Validation { pos, .. } => Some(pos),
            WdlError::NoSuchTask { pos, .. } => Some(pos),
            WdlError::UnexpectedNode { pos, .. } => Some(pos),
            WdlError::DockerClassification { pos, .. } => Some(pos),
            _ => None,
        }
    }

    /// Create a syntax error
    pub fn syntax_error(
        pos: SourcePosition,
        message: String,
        declared_wdl_version: Option<String>,
    ) -> Self {
        WdlError::Syntax {
            pos,
            message,
            declared_wdl_version,
        }
    }

    /// Create an import error
    pub fn import_error(pos: SourcePosition, import_uri: String, message: Option<String>) -> Self {
        let msg = match message {
            Some(m) => format!("Failed to import {}, {}", import_uri, m),
            None => format!("Failed to import {}", import_uri),
        };
        WdlError::Import {
            pos,
            message: msg,
            cause: None,
        }
    }

    /// Create an import error that keeps its underlying cause
    pub fn import_error_with_cause<E>(pos: SourcePosition, import_uri: String, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WdlError::Import {
            pos,
            message: format!("Failed to import {}, {}", import_uri, cause),
            cause: Some(Box::new(cause)),
        }
    }

    /// Create a validation error
    pub fn validation_error(pos: SourcePosition, message: String) -> Self {
        WdlError::Validation { pos, message }
    }

    /// Create an unexpected node error
    pub fn unexpected_node(pos: SourcePosition, expected: &str, found: &str) -> Self {
        WdlError::UnexpectedNode {
            pos,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a docker classification error
    pub fn docker_classification(pos: SourcePosition, task: &str, message: String) -> Self {
        WdlError::DockerClassification {
            pos,
            task: task.to_string(),
            message,
        }
    }

    /// Create a consistency error
    pub fn consistency(message: String) -> Self {
        WdlError::Consistency { message }
    }

    /// Create an I/O error for `path`
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        WdlError::Io {
            path: path.into(),
            source,
        }
    }
}
