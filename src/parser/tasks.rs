//! Token-based task parsing for WDL

use super::declarations::{parse_declaration, parse_declaration_section, parse_key_value_section};
use super::parser_utils::{expect_keyword, parse_identifier, ParseResult};
use super::token_stream::TokenStream;
use super::tokens::Token;
use crate::tree::{content_digest, Task};
use indexmap::IndexMap;

/// Parse a task definition
pub fn parse_task(stream: &mut TokenStream, version: &str) -> ParseResult<Task> {
    let start_index = stream.position();
    let start = stream.current_position();
    expect_keyword(stream, "task")?;
    let name = parse_identifier(stream)?;
    stream.expect(Token::LeftBrace)?;

    let mut inputs = None;
    let mut input_section = None;
    let mut postinputs = Vec::new();
    let mut command = None;
    let mut outputs = Vec::new();
    let mut runtime = IndexMap::new();
    let mut requirements = IndexMap::new();
    let mut hints = IndexMap::new();
    let mut meta = IndexMap::new();
    let mut parameter_meta = IndexMap::new();

    loop {
        match stream.peek_token() {
            Some(Token::RightBrace) => {
                stream.next();
                break;
            }
            Some(Token::Keyword(kw)) => match kw.as_str() {
                "input" => {
                    if inputs.is_some() {
                        return Err(stream.error(format!("Task {} has multiple input sections", name)));
                    }
                    let (pos, decls) = parse_declaration_section(stream, "input", "decl")?;
                    input_section = Some(pos);
                    inputs = Some(decls);
                }
                "output" => {
                    let (_, decls) = parse_declaration_section(stream, "output", "output")?;
                    outputs.extend(decls);
                }
                "command" => {
                    stream.next();
                    match stream.peek_token() {
                        Some(Token::CommandBody(body)) => {
                            stream.next();
                            command = Some(body);
                        }
                        _ => return Err(stream.error("Expected command body".to_string())),
                    }
                }
                "runtime" => runtime.extend(parse_key_value_section(stream, "runtime")?),
                "requirements" => {
                    requirements.extend(parse_key_value_section(stream, "requirements")?)
                }
                "hints" => hints.extend(parse_key_value_section(stream, "hints")?),
                "meta" => meta.extend(parse_key_value_section(stream, "meta")?),
                "parameter_meta" => {
                    parameter_meta.extend(parse_key_value_section(stream, "parameter_meta")?)
                }
                _ => postinputs.push(parse_declaration(stream, "decl")?),
            },
            Some(_) => postinputs.push(parse_declaration(stream, "decl")?),
            None => return Err(stream.error(format!("Unterminated task {}", name))),
        }
    }

    let command = command.ok_or_else(|| {
        crate::error::WdlError::validation_error(
            start.clone(),
            format!("Task {} has no command section", name),
        )
    })?;

    let pos = stream.span_from(&start);
    let digest = content_digest(&pos.abspath, stream.source_since(start_index));

    Ok(Task {
        pos,
        name,
        digest,
        inputs,
        input_section,
        postinputs,
        command,
        outputs,
        runtime,
        requirements,
        hints,
        meta,
        parameter_meta,
        effective_wdl_version: version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Task {
        let mut stream = TokenStream::new(source, "test.wdl", "/test.wdl").unwrap();
        parse_task(&mut stream, "1.0").unwrap()
    }

    #[test]
    fn test_parse_task_sections() {
        let task = parse(
            r#"task align {
  input {
    File fastq
    String docker = "biocontainers/bwa:0.7.17"
  }
  Int threads = 4
  command <<<
    bwa mem -t ~{threads} ref.fa ~{fastq} > out.sam
  >>>
  output {
    File sam = "out.sam"
  }
  runtime {
    docker: docker
    cpu: threads
  }
  meta {
    description: "align reads"
  }
}"#,
        );
        assert_eq!(task.name, "align");
        assert_eq!(task.available_inputs(), vec!["fastq", "docker"]);
        assert_eq!(task.postinputs.len(), 1);
        assert_eq!(task.outputs.len(), 1);
        assert!(task.command.contains("bwa mem"));
        assert_eq!(task.runtime["docker"].ident_name(), Some("docker"));
        assert_eq!(task.input_section.as_ref().map(|p| (p.line, p.end_line)), Some((2, 5)));
        assert_eq!((task.pos.line, task.pos.end_line), (1, 20));
        assert_eq!(task.digest.len(), crate::tree::DIGEST_LEN);
    }

    #[test]
    fn test_task_without_inputs_exposes_body_declarations() {
        let task = parse("task t {\n  String x = \"a\"\n  command {}\n}");
        assert!(task.inputs.is_none());
        assert_eq!(task.available_inputs(), vec!["x"]);
    }

    #[test]
    fn test_task_without_command_is_rejected() {
        let mut stream = TokenStream::new("task t { input {} }", "test.wdl", "/test.wdl").unwrap();
        assert!(parse_task(&mut stream, "1.0").is_err());
    }
}
