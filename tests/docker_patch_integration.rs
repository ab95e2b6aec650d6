use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use wdl_docker_patch::docker::{self, DockerHint, NameSource, NamingWarning, PatchOptions};
use wdl_docker_patch::tree::loader;
use wdl_docker_patch::DockerShape;

const TASKS: &str = r#"version 1.0
task align {
  input {
    Int n
  }
  command {
    echo ~{n}
  }
  runtime {
    docker: "repo/img:1.0"
  }
}
task sort {
  input {
    String gatk_docker = "broadinstitute/gatk:4.1"
  }
  command {}
  runtime {
    docker: gatk_docker
  }
}
task mark {
  input {
    String gatk_docker = "broadinstitute/gatk:4.2"
  }
  command {}
  runtime {
    docker: gatk_docker
  }
}
"#;

const SUB: &str = r#"version 1.0
import "tasks.wdl" as lib
workflow sub {
  input {
    Int n
  }
  call lib.align { input: n = n }
}
"#;

const MAIN: &str = r#"version 1.0
import "tasks.wdl" as lib
import "sub.wdl" as subwf
workflow main {
  call lib.align as direct { input: n = 1 }
  call subwf.sub { input: n = 2 }
  call lib.sort
  call lib.mark
}
"#;

fn write_workflow(dir: &Path) -> Result<String, Box<dyn Error>> {
    fs::write(dir.join("tasks.wdl"), TASKS)?;
    fs::write(dir.join("sub.wdl"), SUB)?;
    fs::write(dir.join("main.wdl"), MAIN)?;
    Ok(dir.join("main.wdl").to_string_lossy().into_owned())
}

fn patched_text(outcome: &docker::PatchOutcome, file_name: &str) -> String {
    outcome
        .patch_set
        .documents
        .iter()
        .find(|(path, _)| path.ends_with(file_name))
        .map(|(_, doc)| doc.modified_text())
        .unwrap_or_default()
}

fn blacklist() -> Vec<String> {
    vec!["docker".to_string()]
}

#[test]
fn literal_image_threaded_through_both_call_chains() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let document = loader::load(&main)?;
    let outcome = docker::run(&document, Vec::new(), &blacklist(), &PatchOptions::default())?;

    let tasks = patched_text(&outcome, "tasks.wdl");
    assert!(tasks.contains("    Int n\n    String img_docker\n  }"));
    assert!(tasks.contains("    docker: img_docker\n"));
    assert!(!tasks.contains("\"repo/img:1.0\""));

    let sub = patched_text(&outcome, "sub.wdl");
    assert!(sub.contains("    Int n\n    String img_docker\n  }"));
    assert_eq!(sub.matches("img_docker = img_docker").count(), 1);
    assert!(sub.contains("call lib.align { input: n = n, img_docker = img_docker }"));

    let main_text = patched_text(&outcome, "main.wdl");
    assert!(main_text.contains("call lib.align as direct { input: n = 1, img_docker = img_docker }"));
    assert!(main_text.contains("call subwf.sub { input: n = 2, img_docker = img_docker }"));
    assert_eq!(main_text.matches("String img_docker").count(), 1);

    assert_eq!(
        outcome.required_inputs.get("main.img_docker").map(String::as_str),
        Some("repo/img:1.0")
    );
    assert_eq!(outcome.file_patches.len(), 3);
    assert!(outcome.file_patches.iter().all(|p| p.path.starts_with("./")));
    Ok(())
}

#[test]
fn inconsistent_name_reuse_gets_distinct_names() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let document = loader::load(&main)?;
    let outcome = docker::run(&document, Vec::new(), &blacklist(), &PatchOptions::default())?;

    assert!(outcome
        .naming
        .warnings
        .iter()
        .any(|w| matches!(w, NamingWarning::InconsistentName { var_name, .. } if var_name == "gatk_docker")));

    let gatk: Vec<&str> = outcome
        .rows
        .iter()
        .filter(|r| r.var_name.as_deref() == Some("gatk_docker"))
        .map(|r| r.accepted_var_name.as_str())
        .collect();
    assert_eq!(gatk.len(), 2);
    assert_ne!(gatk[0], gatk[1]);
    assert!(gatk.iter().all(|name| name.starts_with("gatk_docker")));
    Ok(())
}

#[test]
fn patched_workflow_rescans_clean() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let document = loader::load(&main)?;
    let outcome = docker::run(&document, Vec::new(), &blacklist(), &PatchOptions::default())?;

    let patched_dir = TempDir::new()?;
    for file_name in ["tasks.wdl", "sub.wdl", "main.wdl"] {
        fs::write(patched_dir.path().join(file_name), patched_text(&outcome, file_name))?;
    }
    let patched = loader::load(&patched_dir.path().join("main.wdl").to_string_lossy())?;
    let again = docker::run(&patched, Vec::new(), &blacklist(), &PatchOptions::default())?;

    assert_eq!(again.findings.len(), 3);
    assert!(again.findings.iter().all(|f| f.shape == DockerShape::InputOnly));
    assert!(again.file_patches.is_empty());
    Ok(())
}

#[test]
fn diff_applies_with_patch_and_rescans_clean() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let root = fs::canonicalize(dir.path())?.to_string_lossy().into_owned();
    let options = PatchOptions {
        abspath_root: Some(root),
        ..PatchOptions::default()
    };
    let document = loader::load(&main)?;
    let outcome = docker::run(&document, Vec::new(), &blacklist(), &options)?;
    assert!(outcome
        .file_patches
        .iter()
        .all(|p| p.path.strip_prefix("./").map_or(false, |rest| !rest.contains('/'))));

    let target = TempDir::new()?;
    write_workflow(target.path())?;
    let diff_file = dir.path().join("docker_patch.diff");
    fs::write(&diff_file, outcome.diff())?;

    let output = match Command::new("patch")
        .arg("-p1")
        .arg("-d")
        .arg(target.path())
        .arg("-i")
        .arg(&diff_file)
        .output()
    {
        Ok(output) => output,
        // no `patch` binary on this machine
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));

    for file_name in ["tasks.wdl", "sub.wdl", "main.wdl"] {
        assert_eq!(
            fs::read_to_string(target.path().join(file_name))?,
            patched_text(&outcome, file_name)
        );
    }
    let patched = loader::load(&target.path().join("main.wdl").to_string_lossy())?;
    let again = docker::run(&patched, Vec::new(), &blacklist(), &PatchOptions::default())?;
    assert_eq!(again.findings.len(), 3);
    assert!(again.findings.iter().all(|f| f.shape == DockerShape::InputOnly));
    assert!(again.file_patches.is_empty());
    Ok(())
}

#[test]
fn digest_hint_wins_over_image_name() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("dedup.wdl");
    fs::write(
        &path,
        r#"version 1.0
task dedup {
  command {}
  runtime {
    docker: "repo/tools:latest"
  }
}
workflow w {
  call dedup
}
"#,
    )?;
    let document = loader::load(&path.to_string_lossy())?;
    let digest = document.tasks[0].digest.clone();
    let hints = vec![DockerHint {
        var_name: Some("picard_docker".to_string()),
        url: None,
        digest: Some(digest.clone()),
    }];
    let outcome = docker::run(&document, hints, &blacklist(), &PatchOptions::default())?;

    let decision = outcome.naming.get(&digest).ok_or("no decision")?;
    assert_eq!(decision.accepted_name, "picard_docker");
    assert_eq!(decision.source, NameSource::UserByDigest);
    let text = patched_text(&outcome, "dedup.wdl");
    assert!(text.contains("docker: picard_docker"));
    assert!(text.contains("picard_docker = picard_docker"));
    Ok(())
}

#[test]
fn cli_writes_outputs() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let out = dir.path().join("out");
    let config = dir.path().join("config.toml");
    fs::write(&config, "context_lines = 1\n")?;

    let status = Command::new(env!("CARGO_BIN_EXE_wdl-docker-patch"))
        .args(["-i", &main, "-o"])
        .arg(&out)
        .arg("-c")
        .arg(&config)
        .status()?;
    assert!(status.success());

    for file_name in ["docker_patch.diff", "patch_dataframe.tsv", "docker_inputs.json", "call_tree.json"] {
        assert!(out.join(file_name).is_file(), "missing {}", file_name);
    }
    let inputs: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join("docker_inputs.json"))?)?;
    assert_eq!(inputs["main.img_docker"], "repo/img:1.0");
    let diff = fs::read_to_string(out.join("docker_patch.diff"))?;
    assert!(diff.lines().any(|l| l.starts_with("+++ ./") && l.contains("/tasks.wdl\t")));
    Ok(())
}

#[test]
fn cli_fails_on_missing_hint_file() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let main = write_workflow(dir.path())?;
    let output = Command::new(env!("CARGO_BIN_EXE_wdl-docker-patch"))
        .args(["-i", &main, "-d"])
        .arg(dir.path().join("missing.json"))
        .arg("-c")
        .arg(dir.path().join("no-config.toml"))
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: "));
    Ok(())
}
