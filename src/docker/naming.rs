//! Assignment of one docker variable name per image
//!
//! Precedence, highest first:
//!
//! 1. a hint pinning a name to a task digest
//! 2. a hint reserving a name for an image URL
//! 3. the most common existing variable name used with that URL
//! 4. a name derived from the image, `<image>_docker`
//! 5. `<task digest>_docker`
//!
//! Inputs that already have no default keep their name. Blacklisted names and
//! names reused with several URLs are never picked automatically.

use super::hints::{DockerHint, HintKind};
use super::scanner::{DockerFinding, DockerShape};
use crate::error::WdlError;
use crate::graph::CallGraph;
use indexmap::IndexMap;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Where an accepted name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameSource {
    UserByDigest,
    UserByUrl,
    ScannedCommonName,
    ScannedImageName,
    ScannedGeneric,
    ExistingName,
}

impl NameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameSource::UserByDigest => "user-by-digest",
            NameSource::UserByUrl => "user-by-url",
            NameSource::ScannedCommonName => "scanned-common-name",
            NameSource::ScannedImageName => "scanned-image-name",
            NameSource::ScannedGeneric => "scanned-generic",
            NameSource::ExistingName => "existing-name",
        }
    }
}

impl fmt::Display for NameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingDecision {
    pub task_digest: String,
    pub accepted_name: String,
    pub source: NameSource,
    /// Some caller of a task with a defaulted input does not bind it
    pub override_required: bool,
}

/// Advisory conditions found while naming; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingWarning {
    /// A digest hint also names a URL, which is ignored
    DigestAndUrl { var_name: String, digest: String },
    /// A hint without `var_name`
    UnmatchedHint { hint: String },
    /// A hint digest matching no rewritable task
    IgnoredDigestHint { var_name: String, digest: String, reason: String },
    /// A URL hint matching no task
    IgnoredUrlHint { var_name: String, url: String },
    DuplicateDigestHint { digest: String, var_name: String },
    DuplicateUrlHint { url: String, var_name: String },
    /// A name both reserved by a hint and blacklisted
    BlacklistConflict { var_name: String },
    /// One existing variable name used with several images
    InconsistentName { var_name: String, urls: Vec<String> },
    /// A call does not bind the docker input of its task
    CallerMissingInput { caller: String, task: String, var_name: String },
}

impl fmt::Display for NamingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingWarning::DigestAndUrl { var_name, digest } => write!(
                f,
                "hint {} pins task {}, its url is ignored",
                var_name, digest
            ),
            NamingWarning::UnmatchedHint { hint } => {
                write!(f, "unmatched docker variable hint, ignoring: {}", hint)
            }
            NamingWarning::IgnoredDigestHint { var_name, digest, reason } => {
                write!(f, "hint {} for task {} ignored: {}", var_name, digest, reason)
            }
            NamingWarning::IgnoredUrlHint { var_name, url } => {
                write!(f, "hint {} matches no task using {}", var_name, url)
            }
            NamingWarning::DuplicateDigestHint { digest, var_name } => write!(
                f,
                "task {} already has a hinted name, ignoring {}",
                digest, var_name
            ),
            NamingWarning::DuplicateUrlHint { url, var_name } => write!(
                f,
                "url {} already has a hinted name, ignoring {}",
                url, var_name
            ),
            NamingWarning::BlacklistConflict { var_name } => write!(
                f,
                "variable name '{}' is both hinted and blacklisted",
                var_name
            ),
            NamingWarning::InconsistentName { var_name, urls } => write!(
                f,
                "variable name '{}' is used by multiple tasks with different docker urls: {}",
                var_name,
                urls.join(", ")
            ),
            NamingWarning::CallerMissingInput { caller, task, var_name } => write!(
                f,
                "caller '{}' of task {} not providing input '{}'",
                caller, task, var_name
            ),
        }
    }
}

/// Accepted name per task digest, in finding order
#[derive(Debug, Clone, Default)]
pub struct NamingTable {
    pub decisions: IndexMap<String, NamingDecision>,
    pub warnings: Vec<NamingWarning>,
}

impl NamingTable {
    pub fn get(&self, task_digest: &str) -> Option<&NamingDecision> {
        self.decisions.get(task_digest)
    }
}

/// Why a name is taken
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reservation {
    Hint,
    Existing,
    Assigned,
}

/// Image part of a docker reference: last path segment without tag or digest.
pub fn image_name(url: &str) -> Option<String> {
    let segment = url.rsplit('/').next().unwrap_or(url);
    let image = segment.split(':').next().unwrap_or(segment);
    let image = image.split('@').next().unwrap_or(image);
    if image.is_empty() {
        return None;
    }
    let name = NON_IDENTIFIER.replace_all(image, "_").to_string();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("image_{}", name))
    } else {
        Some(name)
    }
}

struct Resolver<'f> {
    findings: &'f [DockerFinding],
    used: HashMap<String, Reservation>,
    blacklist: HashSet<String>,
    ambiguous: HashSet<String>,
    url_hints: HashMap<String, String>,
    decided: HashMap<String, (String, NameSource)>,
    warnings: Vec<NamingWarning>,
}

impl<'f> Resolver<'f> {
    fn warn(&mut self, warning: NamingWarning) {
        match warning {
            NamingWarning::InconsistentName { .. } | NamingWarning::CallerMissingInput { .. } => {
                error!("{}", warning)
            }
            _ => warn!("{}", warning),
        }
        self.warnings.push(warning);
    }

    fn is_free(&self, name: &str) -> bool {
        !self.used.contains_key(name) && !self.blacklist.contains(name)
    }

    /// `base`, or `base_1`, `base_2`, ... whichever is free first.
    fn unique(&self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 1;
        while !self.is_free(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        candidate
    }

    fn apply_hints(&mut self, hints: &[DockerHint]) {
        for hint in hints {
            match hint.kind() {
                HintKind::ByDigest { var_name, digest } => {
                    if hint.url.is_some() {
                        self.warn(NamingWarning::DigestAndUrl {
                            var_name: var_name.to_string(),
                            digest: digest.to_string(),
                        });
                    }
                    let finding = self.findings.iter().find(|f| f.task_digest == digest);
                    match finding.map(|f| f.shape) {
                        None => self.warn(NamingWarning::IgnoredDigestHint {
                            var_name: var_name.to_string(),
                            digest: digest.to_string(),
                            reason: "no task with a docker image has this digest".to_string(),
                        }),
                        Some(DockerShape::InputOnly) => self.warn(NamingWarning::IgnoredDigestHint {
                            var_name: var_name.to_string(),
                            digest: digest.to_string(),
                            reason: "docker input already has no default".to_string(),
                        }),
                        Some(_) if self.decided.contains_key(digest) => {
                            self.warn(NamingWarning::DuplicateDigestHint {
                                digest: digest.to_string(),
                                var_name: var_name.to_string(),
                            })
                        }
                        Some(_) => {
                            if self.blacklist.contains(var_name) {
                                self.warn(NamingWarning::BlacklistConflict {
                                    var_name: var_name.to_string(),
                                });
                            }
                            self.decided.insert(
                                digest.to_string(),
                                (var_name.to_string(), NameSource::UserByDigest),
                            );
                            self.used
                                .entry(var_name.to_string())
                                .or_insert(Reservation::Hint);
                        }
                    }
                }
                HintKind::ByUrl { var_name, url } => {
                    if self.url_hints.contains_key(url) {
                        self.warn(NamingWarning::DuplicateUrlHint {
                            url: url.to_string(),
                            var_name: var_name.to_string(),
                        });
                        continue;
                    }
                    if !self.findings.iter().any(|f| f.docker_url.as_deref() == Some(url)) {
                        self.warn(NamingWarning::IgnoredUrlHint {
                            var_name: var_name.to_string(),
                            url: url.to_string(),
                        });
                    }
                    if self.blacklist.contains(var_name) {
                        self.warn(NamingWarning::BlacklistConflict {
                            var_name: var_name.to_string(),
                        });
                    }
                    self.url_hints.insert(url.to_string(), var_name.to_string());
                    self.used
                        .entry(var_name.to_string())
                        .or_insert(Reservation::Hint);
                }
                HintKind::Blacklist { var_name } => {
                    if self.used.get(var_name) == Some(&Reservation::Hint) {
                        self.warn(NamingWarning::BlacklistConflict {
                            var_name: var_name.to_string(),
                        });
                    }
                    self.blacklist.insert(var_name.to_string());
                }
                HintKind::Unmatched => self.warn(NamingWarning::UnmatchedHint {
                    hint: hint.to_string(),
                }),
            }
        }
    }

    fn keep_existing_names(&mut self) {
        for finding in self.findings {
            if let (DockerShape::InputOnly, Some(name)) = (finding.shape, &finding.var_name) {
                self.decided.insert(
                    finding.task_digest.clone(),
                    (name.clone(), NameSource::ExistingName),
                );
                self.used.entry(name.clone()).or_insert(Reservation::Existing);
            }
        }
    }

    fn find_ambiguous_names(&mut self) {
        let mut urls_by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for finding in self.findings {
            if let (DockerShape::InputWithDefault, Some(name), Some(url)) =
                (finding.shape, &finding.var_name, &finding.docker_url)
            {
                urls_by_name
                    .entry(name.as_str())
                    .or_default()
                    .insert(url.as_str());
            }
        }
        for (name, urls) in urls_by_name {
            if urls.len() > 1 {
                self.ambiguous.insert(name.to_string());
                self.warn(NamingWarning::InconsistentName {
                    var_name: name.to_string(),
                    urls: urls.into_iter().map(str::to_string).collect(),
                });
            }
        }
    }

    /// Most common existing name of `group`, first appearance breaking ties
    fn common_name(&self, group: &[&DockerFinding]) -> Option<String> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for finding in group {
            if let Some(name) = &finding.var_name {
                *counts.entry(name.as_str()).or_insert(0) += 1;
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (name, count) in counts {
            if name == "docker" || self.ambiguous.contains(name) || !self.is_free(name) {
                continue;
            }
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((name, count));
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    fn name_urls(&mut self) {
        let mut groups: BTreeMap<&str, Vec<&DockerFinding>> = BTreeMap::new();
        for finding in self.findings {
            if self.decided.contains_key(&finding.task_digest) {
                continue;
            }
            if let Some(url) = &finding.docker_url {
                groups.entry(url.as_str()).or_default().push(finding);
            }
        }

        for (url, group) in groups {
            let choice = if let Some(name) = self.url_hints.get(url) {
                Some((name.clone(), NameSource::UserByUrl))
            } else if let Some(name) = self.common_name(&group) {
                Some((name, NameSource::ScannedCommonName))
            } else {
                image_name(url).map(|image| {
                    (self.unique(&format!("{}_docker", image)), NameSource::ScannedImageName)
                })
            };

            match choice {
                Some((name, source)) => {
                    info!("{} -> {} ({})", url, name, source);
                    for finding in &group {
                        self.decided
                            .insert(finding.task_digest.clone(), (name.clone(), source));
                    }
                    self.used.entry(name).or_insert(Reservation::Assigned);
                }
                None => {
                    for finding in &group {
                        let name = self.unique(&format!("{}_docker", finding.task_digest));
                        info!("{} [{}] -> {} ({})", url, finding.task_name, name, NameSource::ScannedGeneric);
                        self.decided.insert(
                            finding.task_digest.clone(),
                            (name.clone(), NameSource::ScannedGeneric),
                        );
                        self.used.insert(name, Reservation::Assigned);
                    }
                }
            }
        }
    }
}

/// Decide the variable name of every finding
pub fn resolve(
    findings: &[DockerFinding],
    hints: &[DockerHint],
    graph: &CallGraph<'_>,
) -> Result<NamingTable, WdlError> {
    let mut resolver = Resolver {
        findings,
        used: HashMap::new(),
        blacklist: HashSet::new(),
        ambiguous: HashSet::new(),
        url_hints: HashMap::new(),
        decided: HashMap::new(),
        warnings: Vec::new(),
    };
    resolver.apply_hints(hints);
    resolver.keep_existing_names();
    resolver.find_ambiguous_names();
    resolver.name_urls();

    let mut decisions = IndexMap::new();
    for finding in findings {
        let (accepted_name, source) = resolver
            .decided
            .remove(&finding.task_digest)
            .ok_or_else(|| {
                WdlError::consistency(format!(
                    "no docker variable name decided for task {} [{}]",
                    finding.task_name, finding.task_digest
                ))
            })?;

        let mut override_required = false;
        if let (DockerShape::InputWithDefault, Some(var_name)) = (finding.shape, &finding.var_name) {
            for node in graph.call_sites_of(&finding.task_digest) {
                let call = graph.call_of(node).ok_or_else(|| {
                    WdlError::consistency(format!("call site {} not indexed", node.digest))
                })?;
                if !call.inputs.contains_key(var_name) {
                    override_required = true;
                    resolver.warn(NamingWarning::CallerMissingInput {
                        caller: node.metadata_path.clone(),
                        task: finding.task_name.clone(),
                        var_name: var_name.clone(),
                    });
                }
            }
        }

        decisions.insert(
            finding.task_digest.clone(),
            NamingDecision {
                task_digest: finding.task_digest.clone(),
                accepted_name,
                source,
                override_required,
            },
        );
    }

    Ok(NamingTable {
        decisions,
        warnings: resolver.warnings,
    })
}
