use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_NAME: &str = "loadorder.txt";

/// Errors reading a loader configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a load session finds its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory holding the manifest and every plugin file.
    pub data_dir: PathBuf,
    /// Manifest filename, relative to `data_dir`.
    pub manifest_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let config = serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(path)?))?;
        Ok(config)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join(&self.manifest_name)
    }

    pub fn plugin_path(&self, filename: &str) -> PathBuf {
        self.data_dir.join(filename)
    }
}
