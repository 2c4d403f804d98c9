//! Configuration handling for tuglens

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::LensError;

/// Name of the configuration file looked up in a repository root.
pub const CONFIG_FILE_NAME: &str = "tuglens.toml";

/// Tuglens configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LensConfig {
    /// History reconstruction settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Git driver settings
    #[serde(default)]
    pub git: GitConfig,
}

/// History reconstruction configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Emit a transaction for revisions that change no parsed unit
    #[serde(default = "default_emit_empty_transactions")]
    pub emit_empty_transactions: bool,
}

/// Git driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path to the git binary
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Seconds a single git command may run before it is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_emit_empty_transactions() -> bool {
    true
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            emit_empty_transactions: default_emit_empty_transactions(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GitConfig {
    /// Timeout for one git command
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LensConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, LensError> {
        let content = fs::read_to_string(path).map_err(|e| LensError::Config {
            path: path.display().to_string(),
            message: format!("failed to read config file: {}", e),
        })?;
        toml::from_str(&content).map_err(|e| LensError::Config {
            path: path.display().to_string(),
            message: format!("failed to parse config file: {}", e),
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, LensError> {
        toml::from_str(content).map_err(|e| LensError::Config {
            path: "<string>".to_string(),
            message: format!("failed to parse config: {}", e),
        })
    }

    /// Load tuglens.toml from the given repository root, or defaults if absent
    pub fn load_from_root(root: &Path) -> Result<Self, LensError> {
        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(LensConfig::default())
        }
    }
}
