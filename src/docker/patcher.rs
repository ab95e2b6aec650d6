//! Rewriting of docker references into passthrough inputs
//!
//! For every task whose image is a literal or an input default, the runtime
//! value becomes a reference to the accepted variable, the task declares it
//! as an input without default, and every workflow and call between the task
//! and the root workflow passes it along

use super::document_patch::{common_root, DocumentPatch, EditOutcome, FilePatch};
use super::naming::NamingTable;
use super::scanner::DockerFinding;
use crate::error::{SourcePosition, WdlError};
use crate::graph::{CallGraph, NodeRef};
use crate::tree::{Call, Declaration, Task, Workflow};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    /// Lines of context around each hunk
    pub context_lines: usize,
    /// Directory diff paths are made relative to; derived from the loaded
    /// documents when absent.
    pub abspath_root: Option<String>,
    /// Declared type of added inputs
    pub var_type: String,
}

impl Default for PatchOptions {
    fn default() -> Self {
        PatchOptions {
            context_lines: 3,
            abspath_root: None,
            var_type: "String".to_string(),
        }
    }
}

/// One shadow document per loaded source file, in load order
#[derive(Debug, Clone)]
pub struct PatchSet {
    pub abspath_root: String,
    pub documents: IndexMap<String, DocumentPatch>,
}

impl PatchSet {
    pub fn new<'d, I>(documents: I, abspath_root: Option<String>) -> Self
    where
        I: IntoIterator<Item = &'d crate::tree::Document>,
    {
        let documents: IndexMap<String, DocumentPatch> = documents
            .into_iter()
            .map(|doc| (doc.abspath().to_string(), DocumentPatch::new(doc)))
            .collect();
        let abspath_root = abspath_root.unwrap_or_else(|| {
            let paths: Vec<&str> = documents.keys().map(String::as_str).collect();
            common_root(&paths)
        });
        PatchSet {
            abspath_root,
            documents,
        }
    }

    pub fn get(&self, abspath: &str) -> Option<&DocumentPatch> {
        self.documents.get(abspath)
    }

    fn get_mut(&mut self, abspath: &str) -> Result<&mut DocumentPatch, WdlError> {
        self.documents.get_mut(abspath).ok_or_else(|| {
            WdlError::consistency(format!("document {} was not loaded", abspath))
        })
    }

    /// Diff of every modified document
    pub fn file_patches(&self, context: usize) -> Vec<FilePatch> {
        self.documents
            .values()
            .filter_map(|doc| doc.create_patch(&self.abspath_root, context))
            .collect()
    }

    /// Every document with whether it was modified
    pub fn summary(&self) -> Vec<(&str, bool)> {
        self.documents
            .iter()
            .map(|(path, doc)| (path.as_str(), doc.has_changes()))
            .collect()
    }
}

/// Task or workflow whose input section may gain a declaration
struct Definition<'a> {
    digest: &'a str,
    name: &'a str,
    pos: &'a SourcePosition,
    inputs: Option<&'a [Declaration]>,
    section: Option<&'a SourcePosition>,
}

impl<'a> Definition<'a> {
    fn task(task: &'a Task) -> Self {
        Definition {
            digest: &task.digest,
            name: &task.name,
            pos: &task.pos,
            inputs: task.inputs.as_deref(),
            section: task.input_section.as_ref(),
        }
    }

    fn workflow(workflow: &'a Workflow) -> Self {
        Definition {
            digest: &workflow.digest,
            name: &workflow.name,
            pos: &workflow.pos,
            inputs: workflow.inputs.as_deref(),
            section: workflow.input_section.as_ref(),
        }
    }
}

fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn point(abspath: &str, line: u32, column: u32) -> SourcePosition {
    SourcePosition::new(
        abspath.to_string(),
        abspath.to_string(),
        line,
        column,
        line,
        column,
    )
}

struct PatchEngine<'g, 'a> {
    graph: &'g CallGraph<'a>,
    set: PatchSet,
    var_type: String,
    /// (definition digest, name) pairs already declared
    declared: HashSet<(String, String)>,
    /// (call position, name) pairs already bound
    bound: HashSet<(String, String)>,
    /// Names rendered into each synthesized block, by anchor
    synthesized: HashMap<String, Vec<String>>,
}

impl<'g, 'a> PatchEngine<'g, 'a> {
    /// Record `name` under `anchor`, returning all names of that anchor
    fn accumulate(&mut self, anchor: &SourcePosition, name: &str) -> Vec<String> {
        let key = format!(
            "{}:{}:{}-{}:{}",
            anchor.abspath, anchor.line, anchor.column, anchor.end_line, anchor.end_column
        );
        let names = self.synthesized.entry(key).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        names.clone()
    }

    fn patch_runtime(&mut self, finding: &DockerFinding, name: &str) -> Result<(), WdlError> {
        let doc = self.set.get_mut(&finding.abspath)?;
        if doc.replace_span(&finding.runtime_pos, name)? == EditOutcome::Conflict {
            return Err(WdlError::consistency(format!(
                "runtime docker value of task {} at {} was already rewritten",
                finding.task_name, finding.runtime_pos
            )));
        }
        Ok(())
    }

    /// Make `new` an input without default of `def`, replacing the input
    /// `old` when there is one
    fn patch_declaration(&mut self, def: &Definition<'_>, old: Option<&str>, new: &str) -> Result<(), WdlError> {
        if !self.declared.insert((def.digest.to_string(), new.to_string())) {
            return Ok(());
        }
        debug!("declare {} in {} ({})", new, def.name, def.pos);
        let line = format!("{} {}", self.var_type, new);
        let inputs = def.inputs.unwrap_or(&[]);

        if let Some(decl) = inputs.iter().find(|d| d.name == new) {
            if decl.expr.is_none() {
                return Ok(());
            }
        }
        let existing = inputs
            .iter()
            .find(|d| d.name == new)
            .or_else(|| old.and_then(|old| inputs.iter().find(|d| d.name == old)));

        let doc = self.set.get_mut(&def.pos.abspath)?;
        if let Some(decl) = existing {
            if doc.replace_span(&decl.pos, &line)? == EditOutcome::Conflict {
                if closes_section(def, &decl.pos) {
                    return self.declare_inline(&decl.pos, new);
                }
                let indent = doc
                    .original_line(decl.pos.line)
                    .map(indent_of)
                    .unwrap_or_default()
                    .to_string();
                doc.append_line(decl.pos.end_line, &format!("{}{}", indent, line))?;
            }
            return Ok(());
        }

        let last = inputs.iter().max_by_key(|d| (d.pos.end_line, d.pos.end_column));
        if let Some(last) = last.filter(|d| closes_section(def, &d.pos)) {
            return self.declare_inline(&last.pos, new);
        }
        if !inputs.is_empty() {
            let doc = self.set.get_mut(&def.pos.abspath)?;
            let indent = inputs
                .iter()
                .filter_map(|d| doc.original_line(d.pos.line))
                .map(indent_of)
                .min_by_key(|i| i.chars().count())
                .unwrap_or_default()
                .to_string();
            let last = inputs.iter().map(|d| d.pos.end_line).max().unwrap_or(def.pos.line);
            doc.append_line(last, &format!("{}{}", indent, line))?;
            return Ok(());
        }

        match def.section {
            Some(section) => {
                let doc = self.set.get_mut(&def.pos.abspath)?;
                let outer = doc
                    .original_line(section.line)
                    .map(indent_of)
                    .unwrap_or_default()
                    .to_string();
                let names = self.accumulate(section, new);
                let body: Vec<String> = names
                    .iter()
                    .map(|n| format!("{}  {} {}", outer, self.var_type, n))
                    .collect();
                let text = format!("input {{\n{}\n{}}}", body.join("\n"), outer);
                let doc = self.set.get_mut(&def.pos.abspath)?;
                doc.set_span(section, &text)?;
            }
            None => {
                let (line, column) = self.header_brace(def)?;
                let doc = self.set.get_mut(&def.pos.abspath)?;
                let outer = doc
                    .original_line(def.pos.line)
                    .map(indent_of)
                    .unwrap_or_default()
                    .to_string();
                let anchor = point(&def.pos.abspath, line, column + 1);
                let names = self.accumulate(&anchor, new);
                let body: Vec<String> = names
                    .iter()
                    .map(|n| format!("{}    {} {}", outer, self.var_type, n))
                    .collect();
                let text = format!("\n{}  input {{\n{}\n{}  }}", outer, body.join("\n"), outer);
                let doc = self.set.get_mut(&def.pos.abspath)?;
                doc.set_span(&anchor, &text)?;
            }
        }
        Ok(())
    }

    /// Add `new` on the line of `after`, right behind it. Used when the
    /// input section closes on that line.
    fn declare_inline(&mut self, after: &SourcePosition, new: &str) -> Result<(), WdlError> {
        let anchor = point(&after.abspath, after.end_line, after.end_column);
        let names = self.accumulate(&anchor, new);
        let text: String = names
            .iter()
            .map(|n| format!(" {} {}", self.var_type, n))
            .collect();
        let doc = self.set.get_mut(&after.abspath)?;
        if doc.set_span(&anchor, &text)? == EditOutcome::Conflict {
            return Err(WdlError::consistency(format!(
                "cannot declare {} behind {}",
                new, after
            )));
        }
        Ok(())
    }

    /// Line and 1-based column of the `{` opening the body of `def`
    fn header_brace(&self, def: &Definition<'_>) -> Result<(u32, u32), WdlError> {
        let doc = self
            .set
            .get(&def.pos.abspath)
            .ok_or_else(|| WdlError::consistency(format!("document {} was not loaded", def.pos.abspath)))?;
        for line in def.pos.line..=def.pos.end_line {
            let text = doc.original_line(line).unwrap_or_default();
            let skip = if line == def.pos.line {
                def.pos.column.max(1) as usize - 1
            } else {
                0
            };
            if let Some(index) = text.chars().skip(skip).position(|c| c == '{') {
                return Ok((line, (skip + index) as u32 + 1));
            }
        }
        Err(WdlError::unexpected_node(
            def.pos.clone(),
            "definition with a body",
            def.name,
        ))
    }

    /// Make `call` bind `new = new`, replacing its binding of `old` when
    /// there is one
    fn patch_call(&mut self, call: &Call, old: Option<&str>, new: &str) -> Result<(), WdlError> {
        if !self.bound.insert((call.pos.to_string(), new.to_string())) {
            return Ok(());
        }
        debug!("bind {} in call {} ({})", new, call.name(), call.pos);
        let binding = format!("{} = {}", new, new);
        let doc = self.set.get_mut(&call.pos.abspath)?;

        let existing = match call.inputs.get(new) {
            Some(input) if input.expr.ident_name() == Some(new) => return Ok(()),
            Some(input) => Some(input),
            None => old.and_then(|old| call.inputs.get(old)),
        };
        if let Some(input) = existing {
            if doc.replace_span(&input.pos, &binding)? != EditOutcome::Conflict {
                return Ok(());
            }
        }

        let call_indent = doc
            .original_line(call.pos.line)
            .map(indent_of)
            .unwrap_or_default()
            .to_string();
        let (anchor, text) = match (call.inputs.last(), &call.input_section) {
            (Some((_, last)), Some(section)) => {
                let binding_indent = call
                    .inputs
                    .values()
                    .filter_map(|i| doc.original_line(i.pos.line))
                    .map(indent_of)
                    .min_by_key(|i| i.chars().count())
                    .unwrap_or_default()
                    .to_string();
                let anchor = point(&call.pos.abspath, last.pos.end_line, last.pos.end_column);
                let names = self.accumulate(&anchor, new);
                let text: String = if section.line == section.end_line {
                    names.iter().map(|n| format!(", {} = {}", n, n)).collect()
                } else {
                    names
                        .iter()
                        .map(|n| format!(",\n{}{} = {}", binding_indent, n, n))
                        .collect()
                };
                (anchor, text)
            }
            (None, Some(section)) => {
                let names = self.accumulate(section, new);
                (section.clone(), call_body(&call_indent, &names))
            }
            (None, None) => {
                let anchor = point(&call.pos.abspath, call.pos.end_line, call.pos.end_column);
                let names = self.accumulate(&anchor, new);
                (anchor, format!(" {}", call_body(&call_indent, &names)))
            }
            (Some(_), None) => {
                return Err(WdlError::consistency(format!(
                    "call {} at {} has inputs but no body",
                    call.name(),
                    call.pos
                )))
            }
        };

        let doc = self.set.get_mut(&call.pos.abspath)?;
        if doc.set_span(&anchor, &text)? == EditOutcome::Conflict {
            return Err(WdlError::consistency(format!(
                "cannot add input {} to call {} at {}",
                new,
                call.name(),
                call.pos
            )));
        }
        Ok(())
    }

    fn patch_definition_of(&mut self, call_digest: &str, old: Option<&str>, new: &str) -> Result<(), WdlError> {
        let graph = self.graph;
        let callee = call_digest.split("__").next().unwrap_or(call_digest);
        match graph.by_call_site_digest.get(callee) {
            Some(NodeRef::Task(task)) => self.patch_declaration(&Definition::task(task), old, new),
            Some(NodeRef::Workflow(workflow)) => {
                self.patch_declaration(&Definition::workflow(workflow), old, new)
            }
            _ => Err(WdlError::consistency(format!(
                "definition {} behind call {} not indexed",
                callee, call_digest
            ))),
        }
    }

    fn patch_finding(&mut self, finding: &DockerFinding, new: &str) -> Result<(), WdlError> {
        let graph = self.graph;
        let old = finding.var_name.as_deref();
        info!(
            "patching task {} [{}]: case {} {:?} -> {}",
            finding.task_name, finding.task_digest, finding.shape, old, new
        );

        self.patch_runtime(finding, new)?;
        let task = graph.task_definition(&finding.task_digest).ok_or_else(|| {
            WdlError::consistency(format!("task {} not indexed", finding.task_digest))
        })?;
        self.patch_declaration(&Definition::task(task), old, new)?;

        let call_sites = graph.call_sites_of(&finding.task_digest);
        if call_sites.is_empty() {
            return Err(WdlError::consistency(format!(
                "no call site of task {} [{}]",
                finding.task_name, finding.task_digest
            )));
        }
        for node in call_sites {
            let ancestors = node.parent_digest.as_deref().ok_or_else(|| {
                WdlError::consistency(format!("task node {} has no ancestors", node.digest))
            })?;
            for digest in std::iter::once(&node.digest).chain(ancestors) {
                match graph.by_digest.get(digest) {
                    Some(NodeRef::Scatter(_)) => {}
                    Some(NodeRef::Workflow(workflow)) => {
                        self.patch_declaration(&Definition::workflow(workflow), old, new)?
                    }
                    Some(NodeRef::Call(call)) => {
                        self.patch_call(call, old, new)?;
                        self.patch_definition_of(digest, old, new)?;
                    }
                    Some(NodeRef::Task(task)) => {
                        return Err(WdlError::unexpected_node(
                            task.pos.clone(),
                            "call, workflow or scatter",
                            "task definition",
                        ))
                    }
                    None => {
                        return Err(WdlError::consistency(format!(
                            "ancestor {} of {} not indexed",
                            digest, node.metadata_path
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Whether the input section of `def` ends on the last line of `decl`
fn closes_section(def: &Definition<'_>, decl: &SourcePosition) -> bool {
    def.section.map_or(false, |section| section.end_line == decl.end_line)
}

/// `{ input: ... }` block binding every name to itself.
fn call_body(indent: &str, names: &[String]) -> String {
    let bindings: Vec<String> = names
        .iter()
        .map(|n| format!("{}    {} = {}", indent, n, n))
        .collect();
    format!("{{\n{}  input:\n{}\n{}}}", indent, bindings.join(",\n"), indent)
}

/// Rewrite every case B and C finding to its accepted name
pub fn apply(
    graph: &CallGraph<'_>,
    findings: &[DockerFinding],
    naming: &NamingTable,
    options: &PatchOptions,
) -> Result<PatchSet, WdlError> {
    let mut engine = PatchEngine {
        graph,
        set: PatchSet::new(graph.root.documents(), options.abspath_root.clone()),
        var_type: options.var_type.clone(),
        declared: HashSet::new(),
        bound: HashSet::new(),
        synthesized: HashMap::new(),
    };

    for finding in findings.iter().filter(|f| f.shape.needs_patch()) {
        let decision = naming.get(&finding.task_digest).ok_or_else(|| {
            WdlError::consistency(format!(
                "no naming decision for task {} [{}]",
                finding.task_name, finding.task_digest
            ))
        })?;
        engine.patch_finding(finding, &decision.accepted_name)?;
    }

    Ok(engine.set)
}
