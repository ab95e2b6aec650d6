//! WDL parser implementation using nom
//!
//! Source text is tokenized eagerly by a mode-aware nom lexer and then parsed
//! by recursive descent over the resulting [`token_stream::TokenStream`].
//! Only WDL 1.x documents (`version 1.0`, `1.1`, `development`) are accepted.

pub mod declarations;
pub mod document;
pub mod expressions;
pub mod keywords;
pub mod lexer;
pub mod parser_utils;
pub mod statements;
pub mod tasks;
pub mod token_stream;
pub mod tokens;
pub mod types;

use crate::error::WdlError;
use crate::tree::Document;

pub use lexer::Span;

/// Parse a WDL document from source text. `uri` is the reference as written
/// by the user or importing document, `abspath` the resolved location.
pub fn parse_document(source: &str, uri: &str, abspath: &str) -> Result<Document, WdlError> {
    document::parse_document(source, uri, abspath)
}

/// Parse a document whose uri and abspath are the same string
pub fn parse_document_with_filename(source: &str, filename: &str) -> Result<Document, WdlError> {
    document::parse_document(source, filename, filename)
}
