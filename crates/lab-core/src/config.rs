//! Application configuration
//!
//! Resolution order, later wins: built-in defaults, a JSON config file,
//! environment variables. Front ends apply their own flags on top.

use crate::error::{Error, Result};
use crate::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "LabDigitizer";
const APPLICATION: &str = "lab-digitizer";
const CONFIG_FILE: &str = "config.json";

/// Environment variables checked for the API key, first match wins
pub const API_KEY_VARS: &[&str] = &["LAB_DIGITIZER_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Resolved settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted session archive
    pub archive_dir: PathBuf,
    /// Directory delimited-text exports are written to
    pub export_dir: PathBuf,
    /// Digitizer API base URL
    pub endpoint: String,
    /// Digitizer model id
    pub model: String,
    /// Digitizer API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Tag applied to new scans when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tag: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let archive_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".lab-digitizer"));

        Self {
            archive_dir,
            export_dir: PathBuf::from("."),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            default_tag: None,
        }
    }
}

impl Config {
    /// Resolve configuration from `path` (or the platform config file when
    /// `None`) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read a JSON config file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from environment lookups
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = API_KEY_VARS.iter().copied().find_map(|name| non_empty(name)) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("LAB_DIGITIZER_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = non_empty("LAB_DIGITIZER_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(dir) = non_empty("LAB_DIGITIZER_ARCHIVE_DIR") {
            self.archive_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty("LAB_DIGITIZER_EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }
    }

    /// The API key, or a configuration error naming where to set it
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "no digitizer API key; set one of {}",
                API_KEY_VARS.join(", ")
            ))
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Platform location of the config file, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
}
