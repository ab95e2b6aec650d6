use crate::error::WdlError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".wdl-docker-patch.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PatchConfig {
    /// Lines of context around each diff hunk
    pub context_lines: usize,
    /// Names never assigned automatically
    pub blacklist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abspath_root: Option<String>,
    /// Declared type of added docker inputs
    pub var_type: String,
    pub http_timeout_secs: u64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        PatchConfig {
            context_lines: 3,
            blacklist: vec!["docker".to_string()],
            abspath_root: None,
            var_type: "String".to_string(),
            http_timeout_secs: 30,
        }
    }
}

pub fn config_file_path() -> Result<PathBuf, WdlError> {
    if let Some(home) = env::var_os("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home).join(CONFIG_FILE_NAME));
        }
    }

    if cfg!(windows) {
        if let Some(profile) = env::var_os("USERPROFILE") {
            if !profile.is_empty() {
                return Ok(PathBuf::from(profile).join(CONFIG_FILE_NAME));
            }
        }
    }

    Err(WdlError::Config {
        message: "Unable to determine home directory; pass --config".to_string(),
    })
}

pub fn load_config(path: &Path) -> Result<PatchConfig, WdlError> {
    let config_error = |message: String| WdlError::Config { message };
    match fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<PatchConfig>(&contents)
            .map_err(|e| config_error(format!("Failed to parse {} as TOML: {}", path.display(), e))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PatchConfig::default()),
        Err(err) if path.is_dir() => Err(config_error(format!(
            "Expected {} to be a TOML file, but found a directory ({})",
            path.display(),
            err
        ))),
        Err(err) => Err(WdlError::io(path.display().to_string(), err)),
    }
}
