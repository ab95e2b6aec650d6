//! wdl-docker-patch CLI
//!
//! Loads a WDL workflow with its imports and emits a patch that turns every
//! hard-coded docker image into an input of the root workflow

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use wdl_docker_patch::cli_config::{config_file_path, load_config, PatchConfig};
use wdl_docker_patch::docker::{self, report, PatchOptions};
use wdl_docker_patch::tree::loader::{self, LoadOptions};
use wdl_docker_patch::{logger, WdlError};

#[derive(Parser, Debug)]
#[command(
    name = "wdl-docker-patch",
    version,
    about = "Rewrite hard-coded docker images in WDL workflows into pass-through input variables"
)]
struct Args {
    /// Root WDL document, a path or an http(s) URL
    #[arg(short, long)]
    input: String,

    /// Directory for the diff and reports; the diff goes to stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file of docker variable name hints
    #[arg(short = 'd', long = "docker-hint")]
    docker_hint: Option<PathBuf>,

    /// TOML configuration file (default: ~/.wdl-docker-patch.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lines of context around each diff hunk
    #[arg(long)]
    context: Option<usize>,

    /// Directory the diff paths are made relative to
    #[arg(long)]
    abspath_root: Option<String>,

    /// Also write log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = logger::init(args.debug, args.log_file.as_deref()) {
        eprintln!("Error: failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_settings(args: &Args) -> Result<PatchConfig, WdlError> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let mut config = load_config(&path)?;
    if let Some(context) = args.context {
        config.context_lines = context;
    }
    if let Some(root) = &args.abspath_root {
        config.abspath_root = Some(root.clone());
    }
    Ok(config)
}

fn run(args: Args) -> Result<(), WdlError> {
    let config = load_settings(&args)?;

    let hints = match &args.docker_hint {
        Some(path) if !path.is_file() => {
            return Err(WdlError::Hint {
                message: format!("docker hint file {} does not exist", path.display()),
            })
        }
        Some(path) => {
            info!("loading docker hints from {}", path.display());
            docker::load_hints(path)?
        }
        None => Vec::new(),
    };

    let load_options = LoadOptions {
        http_timeout: Duration::from_secs(config.http_timeout_secs),
    };
    let document = loader::load_with_options(&args.input, &load_options)?;

    let options = PatchOptions {
        context_lines: config.context_lines,
        abspath_root: config.abspath_root.clone(),
        var_type: config.var_type.clone(),
    };
    let outcome = docker::run(&document, hints, &config.blacklist, &options)?;

    info!(
        "docker variable usage:\n{}",
        report::format_usage(&report::usage_counts(&outcome.rows))
    );
    for stat in report::patch_stats(&outcome.file_patches) {
        info!("{}: {} lines patched in {} hunks", stat.path, stat.lines_patched, stat.hunks);
    }
    if !outcome.required_inputs.is_empty() {
        info!(
            "inputs now required by {}: {:?}",
            outcome.root_name, outcome.required_inputs
        );
    }

    match &args.output {
        Some(dir) => outcome.write_outputs(dir)?,
        None => print!("{}", outcome.diff()),
    }
    Ok(())
}
