//! User supplied docker variable name hints
//!
//! A hint file is a JSON object or a list of objects:
//!
//! ```json
//! [
//!   {"var_name": "picard_docker", "digest": "2b0e4c..."},
//!   {"var_name": "gatk_docker", "url": "broadinstitute/gatk:4.2.0.0"},
//!   {"var_name": "ubuntu_docker"}
//! ]
//! ```
//!
//! `null`, `""` and the string `"None"` all mean the field is absent.

use crate::error::WdlError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DockerHint {
    #[serde(default, deserialize_with = "optional_field")]
    pub var_name: Option<String>,
    #[serde(default, deserialize_with = "optional_field")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "optional_field")]
    pub digest: Option<String>,
}

fn optional_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty() && v != "None"))
}

/// What a hint asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind<'a> {
    /// Pin `var_name` to one task definition
    ByDigest { var_name: &'a str, digest: &'a str },
    /// Use `var_name` for every task running `url`
    ByUrl { var_name: &'a str, url: &'a str },
    /// Never assign `var_name` automatically
    Blacklist { var_name: &'a str },
    /// No `var_name`; ignored.
    Unmatched,
}

impl DockerHint {
    pub fn blacklist(var_name: &str) -> Self {
        DockerHint {
            var_name: Some(var_name.to_string()),
            url: None,
            digest: None,
        }
    }

    pub fn kind(&self) -> HintKind<'_> {
        match (&self.var_name, &self.url, &self.digest) {
            (Some(var_name), _, Some(digest)) => HintKind::ByDigest { var_name, digest },
            (Some(var_name), Some(url), None) => HintKind::ByUrl { var_name, url },
            (Some(var_name), None, None) => HintKind::Blacklist { var_name },
            (None, _, _) => HintKind::Unmatched,
        }
    }
}

impl fmt::Display for DockerHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "{{var_name: {}, url: {}, digest: {}}}",
            show(&self.var_name),
            show(&self.url),
            show(&self.digest)
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HintFile {
    Many(Vec<DockerHint>),
    One(DockerHint),
}

/// Parse hint file contents
pub fn parse_hints(text: &str) -> Result<Vec<DockerHint>, WdlError> {
    let file: HintFile = serde_json::from_str(text).map_err(|e| WdlError::Hint {
        message: format!("expected an object or a list of objects: {}", e),
    })?;
    Ok(match file {
        HintFile::Many(hints) => hints,
        HintFile::One(hint) => vec![hint],
    })
}

/// Read and parse the hint file at `path`
pub fn load_hints(path: &Path) -> Result<Vec<DockerHint>, WdlError> {
    let text = fs::read_to_string(path).map_err(|e| WdlError::io(path.display().to_string(), e))?;
    parse_hints(&text).map_err(|e| match e {
        WdlError::Hint { message } => WdlError::Hint {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })
}

/// User hints followed by one blacklist entry per configured name
pub fn with_blacklist(mut hints: Vec<DockerHint>, blacklist: &[String]) -> Vec<DockerHint> {
    hints.extend(blacklist.iter().map(|name| DockerHint::blacklist(name)));
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_and_kinds() {
        let hints = parse_hints(
            r#"[
                {"var_name": "picard_docker", "url": "broadinstitute/picard:2.26", "digest": "abc"},
                {"var_name": "gatk_docker", "url": "broadinstitute/gatk:4.2", "digest": "None"},
                {"var_name": "docker", "url": null},
                {"url": "ubuntu:20.04"}
            ]"#,
        )
        .unwrap();
        assert_eq!(hints.len(), 4);
        assert_eq!(
            hints[0].kind(),
            HintKind::ByDigest { var_name: "picard_docker", digest: "abc" }
        );
        assert_eq!(
            hints[1].kind(),
            HintKind::ByUrl { var_name: "gatk_docker", url: "broadinstitute/gatk:4.2" }
        );
        assert_eq!(hints[2].kind(), HintKind::Blacklist { var_name: "docker" });
        assert_eq!(hints[3].kind(), HintKind::Unmatched);
    }

    #[test]
    fn test_parse_single_object() {
        let hints = parse_hints(r#"{"var_name": "star_docker", "url": "\"quay.io/star:2.7\""}"#).unwrap();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].url.as_deref(), Some("quay.io/star:2.7"));
    }

    #[test]
    fn test_malformed_hints() {
        assert!(matches!(parse_hints("[1, 2]"), Err(WdlError::Hint { .. })));
        assert!(matches!(parse_hints("{"), Err(WdlError::Hint { .. })));
    }

    #[test]
    fn test_blacklist_appended_last() {
        let hints = with_blacklist(
            vec![DockerHint {
                var_name: Some("a".into()),
                url: Some("u".into()),
                digest: None,
            }],
            &["docker".to_string()],
        );
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[1].kind(), HintKind::Blacklist { var_name: "docker" });
        assert_eq!(hints[1].to_string(), "{var_name: docker, url: None, digest: None}");
    }

    #[test]
    fn test_load_hints_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hints.json");
        fs::write(&path, r#"[{"var_name": "x_docker", "digest": "d1"}]"#)?;
        let hints = load_hints(&path)?;
        assert_eq!(hints[0].digest.as_deref(), Some("d1"));
        assert!(matches!(
            load_hints(&dir.path().join("missing.json")),
            Err(WdlError::Io { .. })
        ));
        Ok(())
    }
}
