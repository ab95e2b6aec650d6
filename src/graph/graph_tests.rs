//! Call graph and hierarchy tests over a two-document workflow

use super::*;
use crate::error::WdlError;
use crate::parser;
use crate::tree::Document;

const LIB: &str = r#"version 1.0

task align {
  input {
    String docker = "biocontainers/bwa:0.7.17"
  }
  command <<< bwa mem >>>
  runtime {
    docker: docker
  }
}

workflow qc {
  input {
    String sample
  }
  call align
}
"#;

const MAIN: &str = r#"version 1.0
import "lib.wdl" as lib

workflow main {
  input {
    Array[String] samples
    Boolean run_qc = true
  }
  scatter (s in samples) {
    if (run_qc) {
      if (s != "") {
        call lib.align
      }
    }
  }
  call lib.qc as qc1 { input: sample = "a" }
  call lib.qc as qc2 { input: sample = "b" }
}
"#;

fn load(main: &str) -> Document {
    let mut doc = parser::parse_document(main, "main.wdl", "/work/main.wdl").unwrap();
    let lib = parser::parse_document(LIB, "lib.wdl", "/work/lib.wdl").unwrap();
    for import in doc.imports.iter_mut() {
        import.doc = Some(Box::new(lib.clone()));
    }
    doc
}

#[test]
fn test_node_order_and_kinds() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let kinds: Vec<NodeKind> = graph.nodes.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::RootWorkflow,
            NodeKind::Scatter,
            NodeKind::Task,
            NodeKind::SubWorkflow,
            NodeKind::Task,
            NodeKind::SubWorkflow,
            NodeKind::Task,
        ]
    );
    let aliases: Vec<&str> = graph.nodes.iter().map(|n| n.alias.as_str()).collect();
    assert_eq!(
        aliases,
        vec!["main", "Scatter(s in samples)", "align", "qc1", "align", "qc2", "align"]
    );
    assert_eq!(graph.nodes[2].name, "lib.align");

    let stats = &graph.hierarchy.stats;
    assert_eq!(stats["root-workflow"], 1);
    assert_eq!(stats["sub-workflow"], 2);
    assert_eq!(stats["task"], 3);
    assert_eq!(stats["scatter"], 1);
}

#[test]
fn test_parent_chains() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let root = graph.root_node().unwrap();
    assert!(root.parent_digest.is_none());
    assert_eq!(root.digest, doc.workflow.as_ref().unwrap().digest);

    let scatter = &graph.nodes[1];
    let task = &graph.nodes[2];
    let mut expected = scatter.parent_digest.clone().unwrap();
    expected.push(scatter.digest.clone());
    assert_eq!(task.parent_digest.as_ref(), Some(&expected));
    assert_eq!(
        task.parent.as_ref().unwrap(),
        &vec!["main".to_string(), "Scatter(s in samples)".to_string()]
    );
    assert_eq!(task.conditions, vec!["run_qc", "s != \"\""]);
    assert!(graph.nodes[3].conditions.is_empty());

    let callee = task.callee.as_ref().unwrap();
    assert_eq!(callee.name, "align");
    assert!(task.digest.starts_with(&format!("{}__", callee.digest)));
    assert_eq!(task.inputs_available.as_deref(), Some(&["docker".to_string()][..]));
    assert_eq!(graph.nodes[3].inputs_caller.as_deref(), Some(&["sample".to_string()][..]));
}

#[test]
fn test_shared_sub_workflow_instances() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let first = &graph.nodes[4];
    let second = &graph.nodes[6];

    // same inner call site, distinguished by the calling sub-workflow
    assert_eq!(first.digest, second.digest);
    assert_ne!(first.parent_digest, second.parent_digest);
    assert_eq!(first.metadata_path, "main.qc1.align");
    assert_eq!(second.metadata_path, "main.qc2.align");

    let callee_digest = first.callee_digest().unwrap();
    assert_eq!(graph.call_sites_of(callee_digest).len(), 3);
    assert!(graph.task_definition(callee_digest).is_some());
    assert!(graph.call_of(first).is_some());
}

#[test]
fn test_metadata_paths_skip_scatters() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let task = &graph.nodes[2];
    assert_eq!(task.metadata_path, "main.align");
    assert_eq!(
        task.metadata_digest.as_ref().map(|d| d.len()),
        Some(1)
    );
    assert_eq!(graph.nodes[0].metadata_path, "main");
    assert!(graph.nodes[0].metadata_digest.is_none());
    assert_eq!(
        graph.level_paths(),
        &["main", "main.Scatter(s in samples)", "main.qc1", "main.qc2"]
    );
}

#[test]
fn test_call_site_index() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let sub = &graph.nodes[3];
    let (wf_digest, call_digest) = sub.digest.split_once("__").unwrap();
    assert!(matches!(graph.by_call_site_digest.get(wf_digest), Some(NodeRef::Workflow(_))));
    assert!(matches!(graph.by_call_site_digest.get(call_digest), Some(NodeRef::Call(_))));
    assert!(matches!(graph.by_digest.get(&sub.digest), Some(NodeRef::Call(c)) if c.name() == "qc1"));
    let root = &graph.nodes[0];
    assert!(matches!(graph.by_digest.get(&root.digest), Some(NodeRef::Workflow(_))));
}

#[test]
fn test_hierarchy() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let hierarchy = &graph.hierarchy;
    assert_eq!(hierarchy.roots.len(), 1);
    assert_eq!(count_nodes(&hierarchy.roots[0]), graph.nodes.len());

    let root = &hierarchy.roots[0];
    let child_aliases: Vec<&str> = root.children.iter().map(|c| c.node.alias.as_str()).collect();
    assert_eq!(child_aliases, vec!["Scatter(s in samples)", "qc1", "qc2"]);
    assert_eq!(root.children[1].children.len(), 1);

    let json = hierarchy.to_json().unwrap();
    assert!(json.contains("\"type\": \"root-workflow\""));
    assert!(json.contains("\"children\""));
}

#[test]
fn test_assemble_requires_root_first() {
    let doc = load(MAIN);
    let graph = build(&doc).unwrap();
    let mut nodes = graph.nodes.clone();
    nodes.swap(0, 1);
    assert!(matches!(assemble(&nodes), Err(WdlError::Consistency { .. })));
}

#[test]
fn test_unknown_callee_is_fatal() {
    let doc = load("version 1.0\nimport \"lib.wdl\" as lib\nworkflow main {\n  call lib.missing\n}\n");
    match build(&doc) {
        Err(WdlError::NoSuchTask { name, pos }) => {
            assert_eq!(name, "lib.missing");
            assert_eq!(pos.line, 4);
        }
        other => panic!("unexpected {:?}", other.map(|g| g.nodes.len())),
    }
}

#[test]
fn test_document_without_workflow() {
    let doc = parser::parse_document("version 1.0\ntask t {\n  command {}\n}\n", "t.wdl", "/t.wdl").unwrap();
    assert!(matches!(build(&doc), Err(WdlError::Validation { .. })));
}
