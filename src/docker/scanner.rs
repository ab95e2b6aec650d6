//! Classification of task runtime docker attributes
//!
//! Three shapes are understood:
//!
//! * A: `docker: var` where `var` is an input without default
//! * B: `docker: var` where `var` is an input with a string literal default
//! * C: `docker: "repo/image:tag"`
//!
//! Anything else stops the run, since a patch could not be derived safely.

use crate::error::{SourcePosition, WdlError};
use crate::expr::Expression;
use crate::graph::CallGraph;
use crate::tree::Task;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Runtime keys holding the container image, in lookup order
pub const DOCKER_RUNTIME_KEYS: [&str; 2] = ["docker", "container"];

/// How a task currently expresses its docker image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockerShape {
    /// Input declaration without default
    InputOnly,
    /// Input declaration with a string literal default
    InputWithDefault,
    /// String literal in the runtime section
    Literal,
}

impl DockerShape {
    pub fn case_label(&self) -> char {
        match self {
            DockerShape::InputOnly => 'A',
            DockerShape::InputWithDefault => 'B',
            DockerShape::Literal => 'C',
        }
    }

    /// Shapes the patch engine rewrites
    pub fn needs_patch(&self) -> bool {
        !matches!(self, DockerShape::InputOnly)
    }
}

impl fmt::Display for DockerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.case_label())
    }
}

/// Docker reference of one task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerFinding {
    pub task_digest: String,
    pub task_name: String,
    /// Referenced input (shapes A and B)
    pub var_name: Option<String>,
    /// Image reference without quotes (shapes B and C)
    pub docker_url: Option<String>,
    pub abspath: String,
    /// `line-end_line` of the task definition
    pub lines: String,
    pub shape: DockerShape,
    /// Span of the runtime value expression
    pub runtime_pos: SourcePosition,
    /// Span of the referenced input declaration
    pub declaration_pos: Option<SourcePosition>,
}

/// Classify the docker attribute of `task`; `None` when it has none.
pub fn classify(task: &Task) -> Result<Option<DockerFinding>, WdlError> {
    let value = match DOCKER_RUNTIME_KEYS
        .iter()
        .find_map(|key| task.runtime.get(*key))
    {
        Some(value) => value,
        None => return Ok(None),
    };
    let error = |message: String| {
        WdlError::docker_classification(value.pos().clone(), &task.name, message)
    };

    let (shape, var_name, docker_url, declaration_pos) = match value {
        Expression::String { .. } => match value.string_literal() {
            Some(url) => (DockerShape::Literal, None, Some(url), None),
            None => {
                return Err(error(format!(
                    "interpolated docker string {} cannot be turned into an input",
                    value
                )))
            }
        },
        Expression::Ident { name, .. } => {
            let decl = match task.find_input(name) {
                Some(decl) => decl,
                None if task.find_declaration(name).is_some() => {
                    return Err(error(format!("{} is not an input declaration", name)))
                }
                None => return Err(error(format!("{} is not declared in the task", name))),
            };
            if !decl.decl_type.is_string() {
                return Err(error(format!(
                    "input {} has type {}, expected String",
                    name, decl.decl_type
                )));
            }
            match &decl.expr {
                None => (
                    DockerShape::InputOnly,
                    Some(name.clone()),
                    None,
                    Some(decl.pos.clone()),
                ),
                Some(default) => match default.string_literal() {
                    Some(url) => (
                        DockerShape::InputWithDefault,
                        Some(name.clone()),
                        Some(url),
                        Some(decl.pos.clone()),
                    ),
                    None => {
                        return Err(error(format!(
                            "default of input {} is not a string literal: {}",
                            name, default
                        )))
                    }
                },
            }
        }
        other => {
            return Err(error(format!(
                "unsupported {} expression {}",
                other.kind_name(),
                other
            )))
        }
    };

    Ok(Some(DockerFinding {
        task_digest: task.digest.clone(),
        task_name: task.name.clone(),
        var_name,
        docker_url,
        abspath: task.pos.abspath.clone(),
        lines: task.pos.line_range(),
        shape,
        runtime_pos: value.pos().clone(),
        declaration_pos,
    }))
}

/// Classify every task definition reached by the graph, once per
/// definition, in traversal order
pub fn scan(graph: &CallGraph<'_>) -> Result<Vec<DockerFinding>, WdlError> {
    let mut seen = HashSet::new();
    let mut findings = Vec::new();

    for node in graph.task_nodes() {
        let digest = match node.callee_digest() {
            Some(digest) => digest,
            None => continue,
        };
        if !seen.insert(digest.to_string()) {
            continue;
        }
        let task = graph.task_definition(digest).ok_or_else(|| {
            WdlError::consistency(format!(
                "task definition {} of call {} not indexed",
                digest, node.alias
            ))
        })?;
        if let Some(finding) = classify(task)? {
            debug!(
                "{} [{}]: case {} {:?} {:?}",
                finding.task_name,
                finding.task_digest,
                finding.shape,
                finding.var_name,
                finding.docker_url
            );
            findings.push(finding);
        }
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn task(body: &str) -> Task {
        let source = format!("version 1.0\ntask t {{\n{}\n  command {{}}\n}}\n", body);
        let mut doc = parser::parse_document(&source, "t.wdl", "/work/t.wdl").unwrap();
        doc.tasks.remove(0)
    }

    #[test]
    fn test_literal_is_case_c() {
        let finding = classify(&task("  runtime {\n    docker: \"us.gcr.io/broad-gatk/gatk:4.2.0.0\"\n  }"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.shape, DockerShape::Literal);
        assert_eq!(finding.docker_url.as_deref(), Some("us.gcr.io/broad-gatk/gatk:4.2.0.0"));
        assert!(finding.var_name.is_none());
        assert_eq!(finding.runtime_pos.line, 4);
        assert_eq!(finding.lines, "2-7");
    }

    #[test]
    fn test_input_shapes() {
        let a = classify(&task("  input {\n    String docker\n  }\n  runtime {\n    docker: docker\n  }"))
            .unwrap()
            .unwrap();
        assert_eq!(a.shape, DockerShape::InputOnly);
        assert_eq!(a.var_name.as_deref(), Some("docker"));
        assert!(a.docker_url.is_none());

        let b = classify(&task(
            "  input {\n    String gatk_docker = 'broadinstitute/gatk:4.1'\n  }\n  runtime {\n    docker: gatk_docker\n  }",
        ))
        .unwrap()
        .unwrap();
        assert_eq!(b.shape, DockerShape::InputWithDefault);
        assert_eq!(b.docker_url.as_deref(), Some("broadinstitute/gatk:4.1"));
        assert_eq!(b.declaration_pos.map(|p| p.line), Some(4));
    }

    #[test]
    fn test_container_key() {
        let finding = classify(&task("  runtime {\n    container: \"ubuntu:22.04\"\n  }"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.docker_url.as_deref(), Some("ubuntu:22.04"));
    }

    #[test]
    fn test_no_docker() {
        assert!(classify(&task("  runtime {\n    cpu: 2\n  }")).unwrap().is_none());
        assert!(classify(&task("")).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_shapes_are_fatal() {
        let cases = [
            "  input {\n    String tag\n  }\n  runtime {\n    docker: \"ubuntu:~{tag}\"\n  }",
            "  input {\n    String base\n  }\n  runtime {\n    docker: base + \":1.0\"\n  }",
            "  input {\n    String tag\n    String image = \"ubuntu:~{tag}\"\n  }\n  runtime {\n    docker: image\n  }",
            "  String image = \"ubuntu\"\n  runtime {\n    docker: image\n  }",
            "  runtime {\n    docker: missing\n  }",
            "  input {\n    Int image\n  }\n  runtime {\n    docker: image\n  }",
        ];
        for case in cases {
            match classify(&task(case)) {
                Err(WdlError::DockerClassification { task, .. }) => assert_eq!(task, "t"),
                other => panic!("expected classification error for {:?}, got {:?}", case, other),
            }
        }
    }
}
