//! WDL Abstract Syntax Tree (AST) for documents, tasks, and workflows
//!
//! The tree keeps exactly what the docker patcher consumes: names, source
//! positions of every construct it may rewrite, task runtime sections, input
//! declarations with their defaults, call input bindings and a content digest
//! per task and workflow definition. Imported documents hang off their
//! [`ImportDoc`] once the [`loader`] has resolved them.

use crate::error::SourcePosition;
use crate::expr::Expression;
use crate::types::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

pub mod loader;



/// Number of hex characters kept from a SHA-256 digest
pub const DIGEST_LEN: usize = 32;

/// Content digest of a task or workflow definition.
///
/// The absolute path is part of the hashed material, so two byte-identical
/// definitions living in different documents get distinct identities.
pub fn content_digest(abspath: &str, source_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abspath.as_bytes());
    hasher.update([0u8]);
    hasher.update(source_text.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..DIGEST_LEN].to_string()
}

/// Digest of a call site or scatter: its workflow node id plus position.
pub fn call_site_digest(workflow_node_id: &str, pos: &SourcePosition) -> String {
    let material = format!(
        "{}@{}:{}:{}-{}:{}",
        workflow_node_id, pos.abspath, pos.line, pos.column, pos.end_line, pos.end_column
    );
    let hex = format!("{:x}", Sha256::digest(material.as_bytes()));
    hex[..DIGEST_LEN].to_string()
}

/// WDL struct type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructTypeDef {
    pub pos: SourcePosition,
    pub name: String,
    pub members: IndexMap<String, Type>,
}

/// Value declaration within a task or workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub pos: SourcePosition,
    pub workflow_node_id: String,
    pub decl_type: Type,
    pub name: String,
    pub expr: Option<Expression>,
}

impl Declaration {
    pub fn new(
        pos: SourcePosition,
        decl_type: Type,
        name: String,
        expr: Option<Expression>,
        id_prefix: &str,
    ) -> Self {
        Self {
            pos,
            workflow_node_id: format!("{}-{}", id_prefix, name),
            decl_type,
            name,
            expr,
        }
    }
}

/// A WDL task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub pos: SourcePosition,
    pub name: String,
    pub digest: String,
    /// Declarations of the `input {}` section; `None` when the section is absent.
    pub inputs: Option<Vec<Declaration>>,
    /// Span of the `input {}` section, braces included
    pub input_section: Option<SourcePosition>,
    /// Non-input declarations in the task body
    pub postinputs: Vec<Declaration>,
    /// Raw command template between the delimiters
    pub command: String,
    pub outputs: Vec<Declaration>,
    pub runtime: IndexMap<String, Expression>,
    pub requirements: IndexMap<String, Expression>,
    pub hints: IndexMap<String, Expression>,
    pub meta: IndexMap<String, Expression>,
    pub parameter_meta: IndexMap<String, Expression>,
    pub effective_wdl_version: String,
}

impl Task {
    /// Input declaration named `name`, if the task has one
    pub fn find_input(&self, name: &str) -> Option<&Declaration> {
        self.inputs
            .as_ref()
            .and_then(|inputs| inputs.iter().find(|d| d.name == name))
    }

    /// Any declaration (input or body) named `name`
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.find_input(name)
            .or_else(|| self.postinputs.iter().find(|d| d.name == name))
    }

    /// Names a caller may bind; without an input section every body
    /// declaration is overridable.
    pub fn available_inputs(&self) -> Vec<String> {
        match &self.inputs {
            Some(inputs) => inputs.iter().map(|d| d.name.clone()).collect(),
            None => self.postinputs.iter().map(|d| d.name.clone()).collect(),
        }
    }
}

/// One `name = expr` binding inside a call body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallInput {
    /// Span from the input name through the end of its expression
    pub pos: SourcePosition,
    pub expr: Expression,
}

/// Task or workflow call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub pos: SourcePosition,
    pub workflow_node_id: String,
    /// Task or workflow name, potentially namespaced (e.g., "lib.task_name")
    pub task: String,
    pub alias: Option<String>,
    pub inputs: IndexMap<String, CallInput>,
    /// Span of the `{ ... }` call body, when present.
    pub input_section: Option<SourcePosition>,
    pub afters: Vec<String>,
}

impl Call {
    pub fn new(
        pos: SourcePosition,
        task: String,
        alias: Option<String>,
        inputs: IndexMap<String, CallInput>,
        input_section: Option<SourcePosition>,
        afters: Vec<String>,
    ) -> Self {
        let name = alias
            .clone()
            .unwrap_or_else(|| task.rsplit('.').next().unwrap_or(&task).to_string());
        Self {
            pos,
            workflow_node_id: format!("call-{}", name),
            task,
            alias,
            inputs,
            input_section,
            afters,
        }
    }

    /// Name the call is known by inside its workflow
    pub fn name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.task.rsplit('.').next().unwrap_or(&self.task),
        }
    }
}

/// Scatter section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scatter {
    pub pos: SourcePosition,
    pub workflow_node_id: String,
    pub variable: String,
    pub expr: Expression,
    pub body: Vec<WorkflowElement>,
}

impl Scatter {
    pub fn new(
        pos: SourcePosition,
        variable: String,
        expr: Expression,
        body: Vec<WorkflowElement>,
    ) -> Self {
        Self {
            pos,
            workflow_node_id: format!("scatter-{}", variable),
            variable,
            expr,
            body,
        }
    }

    /// Human readable label, e.g. `Scatter(sample in samples)`.
    pub fn display_name(&self) -> String {
        format!("Scatter({} in {})", self.variable, self.expr)
    }
}

/// Conditional section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub pos: SourcePosition,
    pub workflow_node_id: String,
    pub expr: Expression,
    pub body: Vec<WorkflowElement>,
}

impl Conditional {
    pub fn new(pos: SourcePosition, expr: Expression, body: Vec<WorkflowElement>) -> Self {
        Self {
            workflow_node_id: format!("if-L{}C{}", pos.line, pos.column),
            pos,
            expr,
            body,
        }
    }
}

/// Element of a workflow body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowElement {
    Declaration(Declaration),
    Call(Call),
    Scatter(Box<Scatter>),
    Conditional(Box<Conditional>),
}

/// A WDL workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub pos: SourcePosition,
    pub name: String,
    pub digest: String,
    pub inputs: Option<Vec<Declaration>>,
    pub input_section: Option<SourcePosition>,
    pub body: Vec<WorkflowElement>,
    pub outputs: Option<Vec<Declaration>>,
    pub meta: IndexMap<String, Expression>,
    pub parameter_meta: IndexMap<String, Expression>,
    pub effective_wdl_version: String,
}

impl Workflow {
    /// Input declaration named `name`, if the workflow has one
    pub fn find_input(&self, name: &str) -> Option<&Declaration> {
        self.inputs
            .as_ref()
            .and_then(|inputs| inputs.iter().find(|d| d.name == name))
    }

    /// Names of the declared workflow inputs
    pub fn available_inputs(&self) -> Vec<String> {
        self.inputs
            .as_ref()
            .map(|inputs| inputs.iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default()
    }
}

/// Import statement, with the imported document once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDoc {
    pub pos: SourcePosition,
    pub uri: String,
    /// Required; inferred from the filename if not provided.
    pub namespace: String,
    /// List of (name, alias) pairs
    pub aliases: Vec<(String, String)>,
    pub doc: Option<Box<Document>>,
}

impl ImportDoc {
    pub fn new(
        pos: SourcePosition,
        uri: String,
        namespace: Option<String>,
        aliases: Vec<(String, String)>,
    ) -> Self {
        let namespace = namespace.unwrap_or_else(|| {
            let mut ns = uri.as_str();
            if let Some(slash_pos) = ns.rfind('/') {
                ns = &ns[slash_pos + 1..];
            }
            if let Some(question_pos) = ns.find('?') {
                ns = &ns[..question_pos];
            }
            if let Some(dot_pos) = ns.rfind('.') {
                ns = &ns[..dot_pos];
            }
            ns.to_string()
        });

        Self {
            pos,
            uri,
            namespace,
            aliases,
            doc: None,
        }
    }
}

/// Resolved target of a call
#[derive(Debug, Clone, Copy)]
pub enum Callee<'a> {
    /// Task and the document defining it
    Task(&'a Task, &'a Document),
    /// Workflow and the document defining it
    Workflow(&'a Workflow, &'a Document),
}

/// WDL Document (top-level container)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pos: SourcePosition,
    pub version: String,
    pub imports: Vec<ImportDoc>,
    pub struct_typedefs: Vec<StructTypeDef>,
    pub tasks: Vec<Task>,
    pub workflow: Option<Workflow>,
    pub source_text: String,
}

impl Document {
    /// Absolute path or URL the document was loaded from
    pub fn abspath(&self) -> &str {
        &self.pos.abspath
    }

    /// Source lines without line terminators
    pub fn source_lines(&self) -> Vec<&str> {
        self.source_text.lines().collect()
    }

    pub fn find_task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Resolve a call target relative to this document: `name` refers to a
    /// local task or workflow, `ns.name` goes through the import bound to `ns`.
    pub fn resolve_callee(&self, target: &str) -> Option<Callee<'_>> {
        match target.split_once('.') {
            None => {
                if let Some(task) = self.find_task(target) {
                    return Some(Callee::Task(task, self));
                }
                self.workflow
                    .as_ref()
                    .filter(|wf| wf.name == target)
                    .map(|wf| Callee::Workflow(wf, self))
            }
            Some((namespace, rest)) => {
                let import = self.imports.iter().find(|imp| imp.namespace == namespace)?;
                import.doc.as_ref()?.resolve_callee(rest)
            }
        }
    }

    /// This document and every document it imports, transitively, each once
    pub fn documents(&self) -> Vec<&Document> {
        fn add<'d>(doc: &'d Document, seen: &mut HashSet<String>, out: &mut Vec<&'d Document>) {
            if !seen.insert(doc.abspath().to_string()) {
                return;
            }
            out.push(doc);
            for import in &doc.imports {
                if let Some(child) = &import.doc {
                    add(child, seen, out);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        add(self, &mut seen, &mut out);
        out
    }

    /// Look up a loaded document by absolute path
    pub fn find_document(&self, abspath: &str) -> Option<&Document> {
        self.documents().into_iter().find(|d| d.abspath() == abspath)
    }
}
