//! Depth-first construction of the [`CallGraph`]

use super::hierarchy::{add_metadata_paths, assemble};
use super::level::Level;
use super::{CallGraph, CalleeInfo, GraphNode, NodeKind, NodeRef};
use crate::error::{SourcePosition, WdlError};
use crate::tree::{call_site_digest, Call, Callee, Document, Scatter, Workflow, WorkflowElement};
use log::debug;
use std::collections::HashMap;

/// Enclosing construct of the element being visited
#[derive(Debug, Clone)]
enum Frame {
    /// Workflow or scatter: a graph node.
    Node,
    /// Conditional with its guard expression
    Conditional(String),
}

struct CallGraphBuilder<'a> {
    level: Level,
    frames: Vec<Frame>,
    nodes: Vec<GraphNode>,
    by_digest: HashMap<String, NodeRef<'a>>,
    by_call_site_digest: HashMap<String, NodeRef<'a>>,
}

/// Build the call graph of the workflow in `document`
pub fn build(document: &Document) -> Result<CallGraph<'_>, WdlError> {
    let workflow = document.workflow.as_ref().ok_or_else(|| {
        WdlError::validation_error(
            document.pos.clone(),
            format!("{} defines no workflow", document.abspath()),
        )
    })?;

    let mut builder = CallGraphBuilder {
        level: Level::new(),
        frames: Vec::new(),
        nodes: Vec::new(),
        by_digest: HashMap::new(),
        by_call_site_digest: HashMap::new(),
    };
    builder.visit_root(workflow, document)?;

    let CallGraphBuilder {
        level,
        mut nodes,
        by_digest,
        by_call_site_digest,
        ..
    } = builder;
    add_metadata_paths(&mut nodes, &level)?;
    let hierarchy = assemble(&nodes)?;

    Ok(CallGraph {
        root: document,
        nodes,
        by_digest,
        by_call_site_digest,
        level,
        hierarchy,
    })
}

fn index<'a>(
    map: &mut HashMap<String, NodeRef<'a>>,
    digest: &str,
    target: NodeRef<'a>,
) -> Result<(), WdlError> {
    match map.get(digest) {
        Some(existing) if !existing.same_target(&target) => Err(WdlError::consistency(format!(
            "digest collision on {}: {} at {} and {} at {}",
            digest,
            existing.kind_name(),
            existing.pos(),
            target.kind_name(),
            target.pos()
        ))),
        Some(_) => Ok(()),
        None => {
            map.insert(digest.to_string(), target);
            Ok(())
        }
    }
}

impl<'a> CallGraphBuilder<'a> {
    fn with_level<F>(&mut self, digest: &str, name: &str, f: F) -> Result<(), WdlError>
    where
        F: FnOnce(&mut Self) -> Result<(), WdlError>,
    {
        self.level.enter(digest, name);
        self.frames.push(Frame::Node);
        let result = f(self);
        self.frames.pop();
        self.level.exit();
        result
    }

    fn with_condition<F>(&mut self, guard: String, f: F) -> Result<(), WdlError>
    where
        F: FnOnce(&mut Self) -> Result<(), WdlError>,
    {
        self.frames.push(Frame::Conditional(guard));
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Guards between the current position and the nearest graph node,
    /// outermost first
    fn conditions(&self) -> Vec<String> {
        let mut conditions: Vec<String> = self
            .frames
            .iter()
            .rev()
            .map_while(|frame| match frame {
                Frame::Conditional(guard) => Some(guard.clone()),
                Frame::Node => None,
            })
            .collect();
        conditions.reverse();
        conditions
    }

    fn add_node(
        &mut self,
        kind: NodeKind,
        alias: &str,
        name: &str,
        position: &SourcePosition,
        digest: &str,
    ) -> &mut GraphNode {
        debug!(
            "{} {}: {} [{}]",
            if self.level.is_empty() { "<root>".to_string() } else { self.level.name() },
            kind,
            alias,
            name
        );
        let root = self.level.is_empty();
        let conditions = self.conditions();
        self.nodes.push(GraphNode {
            kind,
            alias: alias.to_string(),
            name: name.to_string(),
            position: position.clone(),
            conditions,
            parent: if root { None } else { Some(self.level.names()) },
            digest: digest.to_string(),
            parent_digest: if root { None } else { Some(self.level.digests()) },
            inputs_caller: None,
            inputs_available: None,
            callee: None,
            metadata_digest: None,
            metadata_path: String::new(),
        });
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    fn visit_root(&mut self, workflow: &'a Workflow, document: &'a Document) -> Result<(), WdlError> {
        self.add_node(
            NodeKind::RootWorkflow,
            &workflow.name,
            &workflow.name,
            &workflow.pos,
            &workflow.digest,
        );
        index(&mut self.by_digest, &workflow.digest, NodeRef::Workflow(workflow))?;
        index(
            &mut self.by_call_site_digest,
            &workflow.digest,
            NodeRef::Workflow(workflow),
        )?;
        self.with_level(&workflow.digest, &workflow.name, move |b| {
            b.visit_body(&workflow.body, document)
        })
    }

    fn visit_body(
        &mut self,
        body: &'a [WorkflowElement],
        document: &'a Document,
    ) -> Result<(), WdlError> {
        for element in body {
            match element {
                WorkflowElement::Declaration(_) => {}
                WorkflowElement::Call(call) => self.visit_call(call, document)?,
                WorkflowElement::Scatter(scatter) => self.visit_scatter(scatter, document)?,
                WorkflowElement::Conditional(cond) => {
                    self.with_condition(cond.expr.to_string(), move |b| {
                        b.visit_body(&cond.body, document)
                    })?
                }
            }
        }
        Ok(())
    }

    fn visit_scatter(&mut self, scatter: &'a Scatter, document: &'a Document) -> Result<(), WdlError> {
        let digest = call_site_digest(&scatter.workflow_node_id, &scatter.pos);
        let name = scatter.display_name();
        self.add_node(
            NodeKind::Scatter,
            &name,
            &name,
            &scatter.pos,
            &digest,
        );
        index(&mut self.by_digest, &digest, NodeRef::Scatter(scatter))?;
        self.with_level(&digest, &name, move |b| {
            b.visit_body(&scatter.body, document)
        })
    }

    fn visit_call(&mut self, call: &'a Call, document: &'a Document) -> Result<(), WdlError> {
        let callee = document
            .resolve_callee(&call.task)
            .ok_or_else(|| WdlError::NoSuchTask {
                pos: call.pos.clone(),
                name: call.task.clone(),
            })?;
        let call_digest = call_site_digest(&call.workflow_node_id, &call.pos);
        let inputs_caller: Vec<String> = call.inputs.keys().cloned().collect();

        match callee {
            Callee::Task(task, _) => {
                let digest = format!("{}__{}", task.digest, call_digest);
                let node = self.add_node(NodeKind::Task, call.name(), &call.task, &call.pos, &digest);
                node.inputs_caller = Some(inputs_caller);
                node.inputs_available = Some(task.available_inputs());
                node.callee = Some(CalleeInfo {
                    name: task.name.clone(),
                    position: task.pos.clone(),
                    digest: task.digest.clone(),
                });
                index(&mut self.by_digest, &digest, NodeRef::Call(call))?;
                index(&mut self.by_call_site_digest, &call_digest, NodeRef::Call(call))?;
                index(&mut self.by_call_site_digest, &task.digest, NodeRef::Task(task))?;
                Ok(())
            }
            Callee::Workflow(workflow, callee_document) => {
                let digest = format!("{}__{}", workflow.digest, call_digest);
                if self.level.contains(&digest) || self.level.digests().first() == Some(&workflow.digest) {
                    return Err(WdlError::validation_error(
                        call.pos.clone(),
                        format!("recursive call of workflow {}", workflow.name),
                    ));
                }
                let node =
                    self.add_node(NodeKind::SubWorkflow, call.name(), &call.task, &call.pos, &digest);
                node.inputs_caller = Some(inputs_caller);
                node.inputs_available = Some(workflow.available_inputs());
                index(&mut self.by_digest, &digest, NodeRef::Call(call))?;
                index(&mut self.by_call_site_digest, &call_digest, NodeRef::Call(call))?;
                index(
                    &mut self.by_call_site_digest,
                    &workflow.digest,
                    NodeRef::Workflow(workflow),
                )?;
                self.with_level(&digest, call.name(), move |b| {
                    b.visit_body(&workflow.body, callee_document)
                })
            }
        }
    }
}
