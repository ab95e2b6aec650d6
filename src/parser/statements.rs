//! Token-based statement parsing for WDL (calls, scatters, conditionals and
//! workflows)

use super::declarations::{parse_declaration, parse_declaration_section, parse_key_value_section};
use super::expressions::parse_expression;
use super::parser_utils::{expect_keyword, parse_identifier, parse_name, ParseResult};
use super::token_stream::TokenStream;
use super::tokens::Token;
use crate::error::SourcePosition;
use crate::expr::Expression;
use crate::tree::{
    content_digest, Call, CallInput, Conditional, Scatter, Workflow, WorkflowElement,
};
use indexmap::IndexMap;

fn peek_contextual(stream: &TokenStream, word: &str) -> bool {
    matches!(stream.peek_token(), Some(Token::Identifier(ref s)) if s == word)
}

/// Parse a call statement
/// call task_name [as alias] [after other]* [{ [input:] name = expr, ... }].
pub fn parse_call_statement(stream: &mut TokenStream) -> ParseResult<Call> {
    let start = stream.current_position();
    expect_keyword(stream, "call")?;

    // Task name, possibly namespaced (lib.task)
    let mut task_name = parse_identifier(stream)?;
    while stream.try_consume(&Token::Dot).is_some() {
        task_name.push('.');
        task_name.push_str(&parse_name(stream)?);
    }

    let alias = if stream.peek_keyword("as") {
        stream.next();
        Some(parse_identifier(stream)?)
    } else {
        None
    };

    let mut afters = Vec::new();
    while peek_contextual(stream, "after") {
        stream.next();
        afters.push(parse_identifier(stream)?);
    }

    let (inputs, input_section) = if stream.peek_token() == Some(Token::LeftBrace) {
        let (inputs, pos) = parse_call_inputs(stream)?;
        (inputs, Some(pos))
    } else {
        (IndexMap::new(), None)
    };

    // some documents place `after` behind the call body
    while peek_contextual(stream, "after") {
        stream.next();
        afters.push(parse_identifier(stream)?);
    }

    Ok(Call::new(
        stream.span_from(&start),
        task_name,
        alias,
        inputs,
        input_section,
        afters,
    ))
}

/// Parse `{ [input:] name = expr, ... }`; a bare `name` binds the
/// same-named value.
fn parse_call_inputs(
    stream: &mut TokenStream,
) -> ParseResult<(IndexMap<String, CallInput>, SourcePosition)> {
    let start = stream.current_position();
    stream.expect(Token::LeftBrace)?;

    if stream.peek_keyword("input") {
        stream.next();
        stream.expect(Token::Colon)?;
    }

    let mut inputs = IndexMap::new();
    loop {
        if stream.try_consume(&Token::RightBrace).is_some() {
            break;
        }
        let key_pos = stream.current_position();
        let name = parse_identifier(stream)?;
        let expr = if stream.try_consume(&Token::Assign).is_some() {
            parse_expression(stream)?
        } else {
            Expression::Ident {
                pos: key_pos.clone(),
                name: name.clone(),
            }
        };
        let pos = stream.span_from(&key_pos);
        if inputs.insert(name.clone(), CallInput { pos, expr }).is_some() {
            return Err(stream.error(format!("Duplicate call input {}", name)));
        }

        if stream.try_consume(&Token::Comma).is_none() {
            stream.expect(Token::RightBrace)?;
            break;
        }
    }

    Ok((inputs, stream.span_from(&start)))
}

/// Parse a scatter block: scatter (x in expr) { body }
pub fn parse_scatter_statement(stream: &mut TokenStream) -> ParseResult<Scatter> {
    let start = stream.current_position();
    expect_keyword(stream, "scatter")?;
    stream.expect(Token::LeftParen)?;
    let variable = parse_identifier(stream)?;
    if !peek_contextual(stream, "in") {
        return Err(stream.error("Expected 'in' in scatter".to_string()));
    }
    stream.next();
    let expr = parse_expression(stream)?;
    stream.expect(Token::RightParen)?;
    let body = parse_body_block(stream)?;
    Ok(Scatter::new(stream.span_from(&start), variable, expr, body))
}

/// Parse a conditional block: if (expr) { body }
pub fn parse_conditional_statement(stream: &mut TokenStream) -> ParseResult<Conditional> {
    let start = stream.current_position();
    expect_keyword(stream, "if")?;
    stream.expect(Token::LeftParen)?;
    let expr = parse_expression(stream)?;
    stream.expect(Token::RightParen)?;
    let body = parse_body_block(stream)?;
    Ok(Conditional::new(stream.span_from(&start), expr, body))
}

fn parse_body_block(stream: &mut TokenStream) -> ParseResult<Vec<WorkflowElement>> {
    stream.expect(Token::LeftBrace)?;
    let mut body = Vec::new();
    while stream.try_consume(&Token::RightBrace).is_none() {
        if stream.is_eof() {
            return Err(stream.error("Unterminated block".to_string()));
        }
        body.push(parse_workflow_element(stream)?);
    }
    Ok(body)
}

/// Parse one element of a workflow body
pub fn parse_workflow_element(stream: &mut TokenStream) -> ParseResult<WorkflowElement> {
    if stream.peek_keyword("call") {
        Ok(WorkflowElement::Call(parse_call_statement(stream)?))
    } else if stream.peek_keyword("scatter") {
        Ok(WorkflowElement::Scatter(Box::new(parse_scatter_statement(stream)?)))
    } else if stream.peek_keyword("if") {
        Ok(WorkflowElement::Conditional(Box::new(
            parse_conditional_statement(stream)?,
        )))
    } else {
        Ok(WorkflowElement::Declaration(parse_declaration(stream, "decl")?))
    }
}

/// Parse a workflow definition
pub fn parse_workflow(stream: &mut TokenStream, version: &str) -> ParseResult<Workflow> {
    let start_index = stream.position();
    let start = stream.current_position();
    expect_keyword(stream, "workflow")?;
    let name = parse_identifier(stream)?;
    stream.expect(Token::LeftBrace)?;

    let mut inputs = None;
    let mut input_section = None;
    let mut outputs = None;
    let mut body = Vec::new();
    let mut meta = IndexMap::new();
    let mut parameter_meta = IndexMap::new();

    loop {
        match stream.peek_token() {
            Some(Token::RightBrace) => {
                stream.next();
                break;
            }
            Some(Token::Keyword(kw)) if kw == "input" => {
                if inputs.is_some() {
                    return Err(stream.error(format!(
                        "Workflow {} has multiple input sections",
                        name
                    )));
                }
                let (pos, decls) = parse_declaration_section(stream, "input", "decl")?;
                input_section = Some(pos);
                inputs = Some(decls);
            }
            Some(Token::Keyword(kw)) if kw == "output" => {
                let (_, decls) = parse_declaration_section(stream, "output", "output")?;
                outputs = Some(decls);
            }
            Some(Token::Keyword(kw)) if kw == "meta" => {
                meta.extend(parse_key_value_section(stream, "meta")?);
            }
            Some(Token::Keyword(kw)) if kw == "parameter_meta" => {
                parameter_meta.extend(parse_key_value_section(stream, "parameter_meta")?);
            }
            Some(Token::Keyword(kw)) if kw == "hints" => {
                parse_key_value_section(stream, "hints")?;
            }
            Some(_) => body.push(parse_workflow_element(stream)?),
            None => return Err(stream.error(format!("Unterminated workflow {}", name))),
        }
    }

    let pos = stream.span_from(&start);
    let digest = content_digest(&pos.abspath, stream.source_since(start_index));

    Ok(Workflow {
        pos,
        name,
        digest,
        inputs,
        input_section,
        body,
        outputs,
        meta,
        parameter_meta,
        effective_wdl_version: version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(source, "test.wdl", "/test.wdl").unwrap()
    }

    #[test]
    fn test_parse_call_with_inputs() {
        let mut stream = stream(
            "call lib.align as align_tumor {\n  input:\n    fastq = tumor,\n    docker = docker\n}",
        );
        let call = parse_call_statement(&mut stream).unwrap();
        assert_eq!(call.task, "lib.align");
        assert_eq!(call.name(), "align_tumor");
        assert_eq!(call.workflow_node_id, "call-align_tumor");
        assert_eq!(call.inputs.len(), 2);
        let docker = &call.inputs["docker"];
        assert_eq!((docker.pos.line, docker.pos.column), (4, 5));
        assert_eq!(docker.pos.end_column, 20);
        assert_eq!(call.input_section.as_ref().map(|p| (p.line, p.end_line)), Some((1, 5)));
    }

    #[test]
    fn test_parse_call_shorthand_and_after() {
        let mut stream = stream("call merge after align { sample, threads = 2 }");
        let call = parse_call_statement(&mut stream).unwrap();
        assert_eq!(call.name(), "merge");
        assert_eq!(call.afters, vec!["align"]);
        assert_eq!(call.inputs["sample"].expr.ident_name(), Some("sample"));
        assert_eq!(call.inputs.get_index_of("threads"), Some(1));
    }

    #[test]
    fn test_parse_call_without_body() {
        let mut stream = stream("call hello\ncall world");
        let call = parse_call_statement(&mut stream).unwrap();
        assert!(call.inputs.is_empty());
        assert!(call.input_section.is_none());
        assert!(stream.peek_keyword("call"));
    }

    #[test]
    fn test_parse_nested_sections() {
        let mut stream = stream(
            "scatter (s in samples) {\n  if (defined(s.bam)) {\n    call qc { input: bam = s.bam }\n  }\n}",
        );
        let scatter = parse_scatter_statement(&mut stream).unwrap();
        assert_eq!(scatter.display_name(), "Scatter(s in samples)");
        match &scatter.body[0] {
            WorkflowElement::Conditional(cond) => {
                assert_eq!(cond.expr.to_string(), "defined(s.bam)");
                assert!(matches!(cond.body[0], WorkflowElement::Call(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
