//! Call graph of a root workflow
//!
//! The graph flattens every construct that creates a call-site identity
//! (root workflow, sub-workflow calls, task calls and scatters) into a list of
//! [`GraphNode`]s. Each node carries its digest and the ordered digests of its
//! ancestors, which is how later passes address one particular instantiation
//! of a task or sub-workflow.

use crate::error::SourcePosition;
use crate::tree::{Call, Document, Scatter, Task, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod builder;
pub mod hierarchy;
pub mod level;

#[cfg(test)]
mod graph_tests;

pub use builder::build;
pub use hierarchy::{assemble, count_nodes, Hierarchy, HierarchyNode};
pub use level::Level;

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    RootWorkflow,
    SubWorkflow,
    Task,
    Scatter,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::SubWorkflow,
        NodeKind::RootWorkflow,
        NodeKind::Task,
        NodeKind::Scatter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::RootWorkflow => "root-workflow",
            NodeKind::SubWorkflow => "sub-workflow",
            NodeKind::Task => "task",
            NodeKind::Scatter => "scatter",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task definition behind a task node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalleeInfo {
    pub name: String,
    pub position: SourcePosition,
    pub digest: String,
}

/// One instantiation of a workflow construct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Name at the call site (definition name for the root)
    pub alias: String,
    /// Dotted call target, e.g. `lib.align`.
    pub name: String,
    pub position: SourcePosition,
    /// Guards of the enclosing conditionals, outermost first
    pub conditions: Vec<String>,
    /// Human readable ancestor names; `None` for the root.
    pub parent: Option<Vec<String>>,
    pub digest: String,
    /// Ancestor digests from the root down; `None` for the root.
    pub parent_digest: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_caller: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_available: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee: Option<CalleeInfo>,
    /// `parent_digest` without scatter levels
    pub metadata_digest: Option<Vec<String>>,
    /// Namespace path of the node as seen in inputs/metadata JSON
    pub metadata_path: String,
}

impl GraphNode {
    /// Digest of the task definition, for task nodes
    pub fn callee_digest(&self) -> Option<&str> {
        self.callee.as_ref().map(|c| c.digest.as_str())
    }
}

/// AST object behind a digest
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Workflow(&'a Workflow),
    Task(&'a Task),
    Call(&'a Call),
    Scatter(&'a Scatter),
}

impl<'a> NodeRef<'a> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeRef::Workflow(_) => "Workflow",
            NodeRef::Task(_) => "Task",
            NodeRef::Call(_) => "Call",
            NodeRef::Scatter(_) => "Scatter",
        }
    }

    pub fn pos(&self) -> &'a SourcePosition {
        match self {
            NodeRef::Workflow(wf) => &wf.pos,
            NodeRef::Task(task) => &task.pos,
            NodeRef::Call(call) => &call.pos,
            NodeRef::Scatter(scatter) => &scatter.pos,
        }
    }

    /// True if both refer to the same definition or statement
    pub fn same_target(&self, other: &NodeRef<'_>) -> bool {
        self.kind_name() == other.kind_name() && self.pos() == other.pos()
    }
}

/// Flat call graph plus its lookup indices
#[derive(Debug)]
pub struct CallGraph<'a> {
    pub root: &'a Document,
    /// Nodes in depth-first pre-order; the root workflow comes first.
    pub nodes: Vec<GraphNode>,
    /// Node digest to the AST object of that node (the call for call nodes)
    pub by_digest: HashMap<String, NodeRef<'a>>,
    /// Call-site digest to its call, and bare definition digest to its
    /// task or workflow
    pub by_call_site_digest: HashMap<String, NodeRef<'a>>,
    pub level: Level,
    pub hierarchy: Hierarchy,
}

impl<'a> CallGraph<'a> {
    pub fn root_node(&self) -> Option<&GraphNode> {
        self.nodes.first()
    }

    pub fn task_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Task)
    }

    /// Every task node instantiating the task definition `callee_digest`
    pub fn call_sites_of(&self, callee_digest: &str) -> Vec<&GraphNode> {
        self.task_nodes()
            .filter(|n| n.callee_digest() == Some(callee_digest))
            .collect()
    }

    /// Call statement behind a task or sub-workflow node
    pub fn call_of(&self, node: &GraphNode) -> Option<&'a Call> {
        match self.by_digest.get(&node.digest) {
            Some(NodeRef::Call(call)) => Some(call),
            _ => None,
        }
    }

    /// Task definition with content digest `digest`
    pub fn task_definition(&self, digest: &str) -> Option<&'a Task> {
        match self.by_call_site_digest.get(digest) {
            Some(NodeRef::Task(task)) => Some(task),
            _ => None,
        }
    }

    /// Human readable level paths visited while building
    pub fn level_paths(&self) -> &[String] {
        self.level.all_paths()
    }
}
