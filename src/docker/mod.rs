//! Docker runtime patching
//!
//! Runs the whole pipeline on a loaded document: build the call graph, scan
//! every task for its docker reference, settle one variable name per task and
//! rewrite the documents so the image is supplied as a root workflow input.

use crate::error::WdlError;
use crate::graph;
use crate::tree::Document;
use indexmap::IndexMap;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub mod diff;
pub mod document_patch;
pub mod hints;
pub mod naming;
pub mod patcher;
pub mod report;
pub mod scanner;

pub use document_patch::{DocumentPatch, EditOutcome, FilePatch};
pub use hints::{load_hints, parse_hints, with_blacklist, DockerHint};
pub use naming::{NameSource, NamingDecision, NamingTable, NamingWarning};
pub use patcher::{PatchOptions, PatchSet};
pub use report::ReportRow;
pub use scanner::{DockerFinding, DockerShape};

pub const DIFF_FILE: &str = "docker_patch.diff";
pub const TSV_FILE: &str = "patch_dataframe.tsv";
pub const INPUTS_FILE: &str = "docker_inputs.json";
pub const CALL_TREE_FILE: &str = "call_tree.json";

/// Everything a patch run produced
#[derive(Debug)]
pub struct PatchOutcome {
    pub root_name: String,
    pub findings: Vec<DockerFinding>,
    pub naming: NamingTable,
    pub patch_set: PatchSet,
    pub file_patches: Vec<FilePatch>,
    pub rows: Vec<ReportRow>,
    pub required_inputs: IndexMap<String, String>,
    pub node_stats: BTreeMap<String, usize>,
    /// Pretty-printed call tree
    pub call_tree: String,
}

impl PatchOutcome {
    /// All file diffs concatenated, in load order
    pub fn diff(&self) -> String {
        self.file_patches.iter().map(|p| p.diff.as_str()).collect()
    }

    /// Write the diff, the naming report, the required inputs and the call
    /// tree into `dir`, creating it if needed
    pub fn write_outputs(&self, dir: &Path) -> Result<(), WdlError> {
        let io_error = |path: &Path, e| WdlError::io(path.display().to_string(), e);
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let path = dir.join(DIFF_FILE);
        fs::write(&path, self.diff()).map_err(|e| io_error(&path, e))?;

        let path = dir.join(TSV_FILE);
        let file = fs::File::create(&path).map_err(|e| io_error(&path, e))?;
        report::write_tsv(&self.rows, file)?;

        let path = dir.join(INPUTS_FILE);
        let inputs = serde_json::to_string_pretty(&self.required_inputs).map_err(|e| {
            WdlError::io(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        fs::write(&path, inputs + "\n").map_err(|e| io_error(&path, e))?;

        let path = dir.join(CALL_TREE_FILE);
        fs::write(&path, format!("{}\n", self.call_tree)).map_err(|e| io_error(&path, e))?;

        info!("outputs written to {}", dir.display());
        Ok(())
    }
}

/// Patch `document` and everything it imports. `hints` are the user hints;
/// `blacklist` names are never assigned automatically.
pub fn run(
    document: &Document,
    hints: Vec<DockerHint>,
    blacklist: &[String],
    options: &PatchOptions,
) -> Result<PatchOutcome, WdlError> {
    let graph = graph::build(document)?;
    let root_name = graph
        .root_node()
        .map(|n| n.alias.clone())
        .ok_or_else(|| WdlError::consistency("call graph has no root".to_string()))?;
    info!(
        "call graph of {}: {} nodes {:?}",
        root_name,
        graph.nodes.len(),
        graph.hierarchy.stats
    );

    let findings = scanner::scan(&graph)?;
    info!(
        "{} tasks with docker runtime, {} to patch",
        findings.len(),
        findings.iter().filter(|f| f.shape.needs_patch()).count()
    );

    let hints = with_blacklist(hints, blacklist);
    let naming = naming::resolve(&findings, &hints, &graph)?;
    if !naming.warnings.is_empty() {
        warn!("{} naming warnings", naming.warnings.len());
    }

    let patch_set = patcher::apply(&graph, &findings, &naming, options)?;
    let file_patches = patch_set.file_patches(options.context_lines);
    for line in report::document_summary(&patch_set) {
        info!("{}", line);
    }

    let rows = report::report_rows(&findings, &naming);
    let required_inputs = report::required_inputs(&rows, &root_name);
    let call_tree = graph.hierarchy.to_json().map_err(|e| {
        WdlError::consistency(format!("cannot serialize call tree: {}", e))
    })?;

    Ok(PatchOutcome {
        root_name,
        node_stats: graph.hierarchy.stats.clone(),
        findings,
        naming,
        patch_set,
        file_patches,
        rows,
        required_inputs,
        call_tree,
    })
}
