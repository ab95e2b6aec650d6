//! Tabular summaries of a patch run

use super::document_patch::FilePatch;
use super::naming::NamingTable;
use super::patcher::PatchSet;
use super::scanner::DockerFinding;
use crate::error::WdlError;
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

/// One line of `patch_dataframe.tsv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub task_digest: String,
    pub task_name: String,
    pub var_name: Option<String>,
    pub docker_url: Option<String>,
    pub accepted_var_name: String,
    pub var_name_source: String,
    pub var_name_override: bool,
    pub abspath: String,
    pub lines: String,
}

pub fn report_rows(findings: &[DockerFinding], naming: &NamingTable) -> Vec<ReportRow> {
    findings
        .iter()
        .map(|finding| {
            let decision = naming.get(&finding.task_digest);
            ReportRow {
                task_digest: finding.task_digest.clone(),
                task_name: finding.task_name.clone(),
                var_name: finding.var_name.clone(),
                docker_url: finding.docker_url.clone(),
                accepted_var_name: decision
                    .map(|d| d.accepted_name.clone())
                    .or_else(|| finding.var_name.clone())
                    .unwrap_or_default(),
                var_name_source: decision.map(|d| d.source.to_string()).unwrap_or_default(),
                var_name_override: decision.map_or(false, |d| d.override_required),
                abspath: finding.abspath.clone(),
                lines: finding.lines.clone(),
            }
        })
        .collect()
}

/// Write `rows` tab separated with a header line
pub fn write_tsv<W: io::Write>(rows: &[ReportRow], writer: W) -> Result<(), WdlError> {
    let to_error = |e: csv::Error| WdlError::io("patch_dataframe.tsv", io::Error::new(io::ErrorKind::Other, e));
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        writer.serialize(row).map_err(to_error)?;
    }
    writer
        .flush()
        .map_err(|e| WdlError::io("patch_dataframe.tsv", e))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCount {
    pub var_name: String,
    pub docker_url: Option<String>,
    pub count: usize,
}

/// How often each (accepted name, URL) pair occurs, most frequent first
pub fn usage_counts(rows: &[ReportRow]) -> Vec<UsageCount> {
    let mut counts: BTreeMap<(&str, Option<&str>), usize> = BTreeMap::new();
    for row in rows {
        *counts
            .entry((row.accepted_var_name.as_str(), row.docker_url.as_deref()))
            .or_default() += 1;
    }
    let mut usage: Vec<UsageCount> = counts
        .into_iter()
        .map(|((var_name, docker_url), count)| UsageCount {
            var_name: var_name.to_string(),
            docker_url: docker_url.map(str::to_string),
            count,
        })
        .collect();
    usage.sort_by(|a, b| b.count.cmp(&a.count));
    usage
}

/// Root workflow inputs a patched workflow needs, keyed `Root.name`.
/// Names without a known URL get a `DEFINE_THIS_URL_<NAME>` placeholder.
pub fn required_inputs(rows: &[ReportRow], root_name: &str) -> IndexMap<String, String> {
    let mut groups: BTreeMap<&str, Vec<&ReportRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.accepted_var_name.as_str()).or_default().push(row);
    }

    let mut inputs = IndexMap::new();
    for (name, group) in groups {
        if group.iter().all(|r| r.docker_url.is_none() && !r.var_name_override) {
            continue;
        }
        let urls: BTreeSet<&str> = group.iter().filter_map(|r| r.docker_url.as_deref()).collect();
        let placeholder = format!("DEFINE_THIS_URL_{}", name.to_uppercase());
        let value = match urls.len() {
            0 => placeholder,
            1 => urls.iter().next().map(|u| u.to_string()).unwrap_or(placeholder),
            _ => {
                warn!("multiple docker urls found for {}: {:?}", name, urls);
                placeholder
            }
        };
        inputs.insert(format!("{}.{}", root_name, name), value);
    }
    inputs
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchStat {
    pub path: String,
    pub lines_patched: usize,
    pub hunks: usize,
}

/// Per file statistics, most patched file first
pub fn patch_stats(patches: &[FilePatch]) -> Vec<PatchStat> {
    let mut stats: Vec<PatchStat> = patches
        .iter()
        .map(|p| PatchStat {
            path: p.path.clone(),
            lines_patched: p.lines_patched,
            hunks: p.hunks,
        })
        .collect();
    stats.sort_by(|a, b| b.lines_patched.cmp(&a.lines_patched));
    stats
}

/// One line per loaded document stating whether it changed
pub fn document_summary(set: &PatchSet) -> Vec<String> {
    set.summary()
        .into_iter()
        .map(|(path, modified)| {
            if modified {
                format!("{}: modified", path)
            } else {
                format!("{}: NOT modified", path)
            }
        })
        .collect()
}

/// Usage counts as aligned text
pub fn format_usage(usage: &[UsageCount]) -> String {
    let width = usage.iter().map(|u| u.var_name.len()).max().unwrap_or(0).max(8);
    let mut out = format!("{:<width$}  {:>5}  {}\n", "var_name", "count", "docker_url", width = width);
    for u in usage {
        out.push_str(&format!(
            "{:<width$}  {:>5}  {}\n",
            u.var_name,
            u.count,
            u.docker_url.as_deref().unwrap_or("None"),
            width = width
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, url: Option<&str>, over: bool) -> ReportRow {
        ReportRow {
            task_digest: format!("d_{}", name),
            task_name: "t".to_string(),
            var_name: None,
            docker_url: url.map(str::to_string),
            accepted_var_name: name.to_string(),
            var_name_source: "scanned-image-name".to_string(),
            var_name_override: over,
            abspath: "/w.wdl".to_string(),
            lines: "3-3".to_string(),
        }
    }

    #[test]
    fn test_tsv_layout() -> Result<(), WdlError> {
        let mut out = Vec::new();
        write_tsv(&[row("img_docker", Some("repo/img:1"), false)], &mut out)?;
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("task_digest\ttask_name\tvar_name\tdocker_url\taccepted_var_name\tvar_name_source\tvar_name_override\tabspath\tlines")
        );
        assert_eq!(
            lines.next(),
            Some("d_img_docker\tt\t\trepo/img:1\timg_docker\tscanned-image-name\tfalse\t/w.wdl\t3-3")
        );
        Ok(())
    }

    #[test]
    fn test_usage_counts() {
        let rows = vec![
            row("a_docker", Some("a:1"), false),
            row("b_docker", Some("b:1"), false),
            row("b_docker", Some("b:1"), false),
        ];
        let usage = usage_counts(&rows);
        assert_eq!(usage[0].var_name, "b_docker");
        assert_eq!(usage[0].count, 2);
        assert_eq!(usage[1].count, 1);
        assert!(format_usage(&usage).contains("b_docker      2  b:1"));
    }

    #[test]
    fn test_required_inputs() {
        let rows = vec![
            row("img_docker", Some("repo/img:1"), false),
            row("img_docker", None, false),
            row("tool_docker", None, true),
            row("plain_docker", None, false),
            row("gatk_docker", Some("gatk:4.1"), false),
            row("gatk_docker", Some("gatk:4.2"), false),
        ];
        let inputs = required_inputs(&rows, "main");
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs["main.img_docker"], "repo/img:1");
        assert_eq!(inputs["main.tool_docker"], "DEFINE_THIS_URL_TOOL_DOCKER");
        assert_eq!(inputs["main.gatk_docker"], "DEFINE_THIS_URL_GATK_DOCKER");
        assert!(!inputs.contains_key("main.plain_docker"));
    }

    #[test]
    fn test_patch_stats_sorted() {
        let patch = |path: &str, lines_patched| FilePatch {
            path: path.to_string(),
            abspath: format!("/{}", path),
            diff: String::new(),
            lines_patched,
            hunks: 1,
        };
        let stats = patch_stats(&[patch("a.wdl", 2), patch("b.wdl", 7)]);
        assert_eq!(stats[0].path, "b.wdl");
        assert_eq!(stats[1].lines_patched, 2);
    }
}
