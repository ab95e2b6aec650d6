//! Nested view of the flat node list
//!
//! Scatters are tree levels but not WDL namespaces, so the metadata path of
//! a node skips them: `Root.sub_workflow.task_alias`.

use super::level::Level;
use super::{GraphNode, NodeKind};
use crate::error::WdlError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// A graph node with its children
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub node: GraphNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

/// Nested call tree plus node counts per kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct Hierarchy {
    pub roots: Vec<HierarchyNode>,
    pub stats: BTreeMap<String, usize>,
}

impl Hierarchy {
    /// Pretty-printed JSON of the tree
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.roots)
    }
}

/// Number of nodes in the subtree rooted at `node`
pub fn count_nodes(node: &HierarchyNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}

/// Node counts per kind; every kind is present.
pub fn node_stats(nodes: &[GraphNode]) -> BTreeMap<String, usize> {
    let mut stats: BTreeMap<String, usize> = NodeKind::ALL
        .iter()
        .map(|kind| (kind.to_string(), 0))
        .collect();
    for node in nodes {
        *stats.entry(node.kind.to_string()).or_insert(0) += 1;
    }
    stats
}

/// Fill `metadata_digest` and `metadata_path` of every node.
///
/// Each node's `parent_digest` must be exactly one of the level paths the
/// builder entered.
pub fn add_metadata_paths(nodes: &mut [GraphNode], level: &Level) -> Result<(), WdlError> {
    let scatters: HashSet<String> = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Scatter)
        .map(|n| n.digest.clone())
        .collect();

    for node in nodes.iter_mut() {
        let parent_digest = match &node.parent_digest {
            Some(path) => path,
            None => {
                node.metadata_digest = None;
                node.metadata_path = node.alias.clone();
                continue;
            }
        };

        let matches = level
            .all_digest_paths()
            .iter()
            .filter(|path| *path == parent_digest)
            .count();
        if matches != 1 {
            return Err(WdlError::consistency(format!(
                "node {} at {} has {} matching level paths",
                node.alias, node.position, matches
            )));
        }

        let metadata_digest: Vec<String> = parent_digest
            .iter()
            .filter(|d| !scatters.contains(*d))
            .cloned()
            .collect();
        let mut names: Vec<&str> = metadata_digest
            .iter()
            .map(|d| level.name_of(d).unwrap_or(d))
            .collect();
        names.push(&node.alias);
        node.metadata_path = names.join(".");
        node.metadata_digest = Some(metadata_digest);
    }
    Ok(())
}

fn place(
    level: &mut [HierarchyNode],
    path: &[String],
    node: &GraphNode,
) -> Result<(), WdlError> {
    let (head, rest) = path.split_first().ok_or_else(|| {
        WdlError::consistency(format!("empty parent path for {}", node.alias))
    })?;

    let mut found = level.iter_mut().filter(|n| &n.node.digest == head);
    let parent = found.next().ok_or_else(|| {
        WdlError::consistency(format!(
            "parent {} of {} at {} not found",
            head, node.alias, node.position
        ))
    })?;
    if found.next().is_some() {
        return Err(WdlError::consistency(format!(
            "parent {} of {} is ambiguous",
            head, node.alias
        )));
    }

    if rest.is_empty() {
        parent.children.push(HierarchyNode {
            node: node.clone(),
            children: Vec::new(),
        });
        Ok(())
    } else {
        place(&mut parent.children, rest, node)
    }
}

/// Nest the flat node list by `parent_digest`. The first node must be the
/// root workflow.
pub fn assemble(nodes: &[GraphNode]) -> Result<Hierarchy, WdlError> {
    let (root, rest) = match nodes.split_first() {
        Some((root, rest)) if root.parent_digest.is_none() => (root, rest),
        _ => {
            return Err(WdlError::consistency(
                "root node must be first in the node list".to_string(),
            ))
        }
    };

    let mut roots = vec![HierarchyNode {
        node: root.clone(),
        children: Vec::new(),
    }];
    for node in rest {
        let path = node.parent_digest.as_deref().ok_or_else(|| {
            WdlError::consistency(format!("second root node {}", node.alias))
        })?;
        place(&mut roots, path, node)?;
    }

    Ok(Hierarchy {
        roots,
        stats: node_stats(nodes),
    })
}
