//! Token-based document parsing for WDL (top-level parser)

use super::declarations::parse_key_value_section;
use super::parser_utils::{expect_keyword, parse_identifier, ParseResult};
use super::statements::parse_workflow;
use super::tasks::parse_task;
use super::token_stream::TokenStream;
use super::tokens::Token;
use super::types::parse_type;
use crate::error::WdlError;
use crate::expr::StringPart;
use crate::tree::{Document, ImportDoc, StructTypeDef, Task, Workflow};
use indexmap::IndexMap;

/// Parse the version declaration: `version 1.0`.
fn parse_version(stream: &mut TokenStream) -> ParseResult<String> {
    if !stream.peek_keyword("version") {
        return Err(stream.error(
            "Expected 'version' declaration; draft-2 documents are not supported".to_string(),
        ));
    }
    stream.next();

    match stream.peek_token() {
        Some(Token::Version(version)) => {
            stream.next();
            if version == "draft-2" || version == "draft-3" {
                return Err(stream.error(format!("Unsupported WDL version {}", version)));
            }
            Ok(version)
        }
        _ => Err(stream.error("Expected version number".to_string())),
    }
}

/// Parse an import statement: import "uri" [as namespace] [alias A as B]*
fn parse_import(stream: &mut TokenStream) -> ParseResult<ImportDoc> {
    let start = stream.current_position();
    expect_keyword(stream, "import")?;

    let uri = match stream.peek_token() {
        Some(Token::StringLiteral { parts, .. }) => {
            let mut uri = String::new();
            for part in parts {
                match part {
                    StringPart::Text(text) => uri.push_str(&text),
                    StringPart::Placeholder { .. } => {
                        return Err(stream.error(
                            "Import URI must not contain placeholders".to_string(),
                        ))
                    }
                }
            }
            stream.next();
            uri
        }
        _ => return Err(stream.error("Expected string literal for import URI".to_string())),
    };

    let namespace = if stream.peek_keyword("as") {
        stream.next();
        Some(parse_identifier(stream)?)
    } else {
        None
    };

    let mut aliases = Vec::new();
    while stream.peek_keyword("alias") {
        stream.next();
        let name = parse_identifier(stream)?;
        expect_keyword(stream, "as")?;
        let alias = parse_identifier(stream)?;
        aliases.push((name, alias));
    }

    Ok(ImportDoc::new(
        stream.span_from(&start),
        uri,
        namespace,
        aliases,
    ))
}

/// Parse a struct definition; member meta sections are skipped.
fn parse_struct(stream: &mut TokenStream) -> ParseResult<StructTypeDef> {
    let start = stream.current_position();
    expect_keyword(stream, "struct")?;
    let name = parse_identifier(stream)?;
    stream.expect(Token::LeftBrace)?;

    let mut members = IndexMap::new();
    loop {
        if stream.try_consume(&Token::RightBrace).is_some() {
            break;
        }
        if stream.is_eof() {
            return Err(stream.error(format!("Unterminated struct {}", name)));
        }
        if stream.peek_keyword("meta") {
            parse_key_value_section(stream, "meta")?;
            continue;
        }
        if stream.peek_keyword("parameter_meta") {
            parse_key_value_section(stream, "parameter_meta")?;
            continue;
        }
        let member_type = parse_type(stream)?;
        let member = parse_identifier(stream)?;
        if members.insert(member.clone(), member_type).is_some() {
            return Err(stream.error(format!(
                "Duplicate member {} in struct {}",
                member, name
            )));
        }
        stream.try_consume(&Token::Comma);
    }

    Ok(StructTypeDef {
        pos: stream.span_from(&start),
        name,
        members,
    })
}

/// Parse a WDL document from its source text
pub fn parse_document(source: &str, uri: &str, abspath: &str) -> Result<Document, WdlError> {
    let mut stream = TokenStream::new(source, uri, abspath)?;
    let start = stream.current_position();

    let version = parse_version(&mut stream)?;
    stream.set_declared_version(&version);

    let mut imports: Vec<ImportDoc> = Vec::new();
    let mut struct_typedefs: Vec<StructTypeDef> = Vec::new();
    let mut tasks: Vec<Task> = Vec::new();
    let mut workflow: Option<Workflow> = None;

    while !stream.is_eof() {
        match stream.peek_token() {
            Some(Token::Keyword(kw)) => match kw.as_str() {
                "import" => imports.push(parse_import(&mut stream)?),
                "struct" => struct_typedefs.push(parse_struct(&mut stream)?),
                "task" => {
                    let task = parse_task(&mut stream, &version)?;
                    if tasks.iter().any(|t| t.name == task.name) {
                        return Err(WdlError::validation_error(
                            task.pos.clone(),
                            format!("Duplicate task {}", task.name),
                        ));
                    }
                    tasks.push(task);
                }
                "workflow" => {
                    if workflow.is_some() {
                        return Err(stream.error(
                            "Multiple workflow definitions not allowed".to_string(),
                        ));
                    }
                    workflow = Some(parse_workflow(&mut stream, &version)?);
                }
                _ => {
                    return Err(stream.error(format!("Unexpected keyword at top level: {}", kw)))
                }
            },
            Some(other) => {
                return Err(stream.error(format!(
                    "Expected import, struct, task, or workflow, found {}",
                    other
                )))
            }
            None => break,
        }
    }

    let pos = stream.span_from(&start);
    Ok(Document {
        pos,
        version,
        imports,
        struct_typedefs,
        tasks,
        workflow,
        source_text: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Document, WdlError> {
        parse_document(source, "main.wdl", "/work/main.wdl")
    }

    #[test]
    fn test_parse_document() {
        let doc = parse(
            r#"version 1.0

import "lib/tasks.wdl" as lib alias Sample as LibSample
import "https://example.com/qc.wdl"

struct Sample {
  String id
  File bam
  meta {
    description: "a sample"
  }
}

task hello {
  command { echo hi }
}

workflow main {
  call hello
  call lib.align
}
"#,
        )
        .unwrap();
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.imports.len(), 2);
        assert_eq!(doc.imports[0].namespace, "lib");
        assert_eq!(doc.imports[0].aliases, vec![("Sample".to_string(), "LibSample".to_string())]);
        assert_eq!(doc.imports[1].namespace, "qc");
        assert_eq!(doc.struct_typedefs[0].members.len(), 2);
        assert_eq!(doc.tasks[0].name, "hello");
        assert_eq!(doc.workflow.as_ref().map(|w| w.body.len()), Some(2));
        assert_eq!(doc.abspath(), "/work/main.wdl");
    }

    #[test]
    fn test_development_version_is_kept_verbatim() {
        let doc = parse("version development\n").unwrap();
        assert_eq!(doc.version, "development");
        assert!(doc.tasks.is_empty());
        assert!(doc.workflow.is_none());
    }

    #[test]
    fn test_rejects_missing_version() {
        let err = parse("task t { command {} }").unwrap_err();
        assert!(matches!(err, WdlError::Syntax { .. }));
    }

    #[test]
    fn test_rejects_draft2() {
        assert!(parse("version draft-2\n").is_err());
    }

    #[test]
    fn test_rejects_second_workflow() {
        let err = parse("version 1.0\nworkflow a {}\nworkflow b {}\n").unwrap_err();
        assert!(err.to_string().contains("Multiple workflow"));
    }

    #[test]
    fn test_rejects_interpolated_import() {
        assert!(parse("version 1.0\nimport \"~{base}/tasks.wdl\"\n").is_err());
    }
}
