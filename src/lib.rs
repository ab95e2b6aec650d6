//! # wdl-docker-patch
//!
//! Loads a WDL workflow with all its imports, finds every task whose runtime
//! docker image is written into the source, and produces a unified diff that
//! turns each image into an input variable threaded from the root workflow
//! down to the task

pub mod cli_config;
pub mod docker;
pub mod error;
pub mod expr;
pub mod graph;
pub mod logger;
pub mod parser;
pub mod tree;
pub mod types;

pub use docker::{run, DockerFinding, DockerHint, DockerShape, PatchOptions, PatchOutcome};
pub use error::{SourcePosition, WdlError};
pub use expr::Expression;
pub use graph::{CallGraph, GraphNode, NodeKind};
pub use tree::{Call, Declaration, Document, Scatter, Task, Workflow};
pub use types::Type;
