use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rendering strategy for the view command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Indented per-project tree
    #[default]
    Tree,
    /// Aligned columns: Project / Date / Branch / Time
    Table,
}

/// Main configuration for the wtt application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared per-user directory holding the ledger, markers and log file
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Branch sampling interval in seconds
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Default rendering strategy for `wtt view`
    #[serde(default)]
    pub render_mode: RenderMode,
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("wtt")
}

fn default_sample_interval_secs() -> u64 {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            sample_interval_secs: default_sample_interval_secs(),
            render_mode: RenderMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::WttError::ConfigError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| crate::error::WttError::ConfigError(e.to_string()))
    }

    /// Merge CLI arguments into this configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_cli_args(&mut self, base_dir: Option<PathBuf>, interval_secs: Option<u64>) {
        if let Some(dir) = base_dir {
            self.base_dir = dir;
        }
        if let Some(secs) = interval_secs {
            self.sample_interval_secs = secs;
        }
    }
}
