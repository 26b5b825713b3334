use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ResumeError, Result};

/// Top-level configuration for the resume index service.
///
/// Loaded from `~/.resume-index/config.toml` by default. Every section falls
/// back to its defaults when omitted, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

impl ResumeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ResumeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ResumeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Directory holding the persisted vector index.
    pub fn index_dir(&self) -> PathBuf {
        resolve_under(&self.data_dir(), &self.storage.index_dir)
    }

    /// Directory where raw uploaded documents are kept.
    pub fn upload_dir(&self) -> PathBuf {
        resolve_under(&self.data_dir(), &self.storage.upload_dir)
    }

    /// Clamp a caller-supplied `top_k` to the configured bounds.
    ///
    /// `None` selects `default_top_k`.
    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.search.default_top_k)
            .min(self.search.max_top_k)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for the index and uploaded files.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP listen port.
    pub port: u16,
    /// HTTP bind address.
    pub bind_address: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.resume-index/data".to_string(),
            log_level: "info".to_string(),
            port: 5000,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Embedding and query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding dimension produced by the configured provider.
    pub embedding_dim: usize,
    /// Directory with `model.onnx` and `tokenizer.json` for the ONNX backend.
    pub model_dir: Option<String>,
    /// Number of results returned by a search when none is requested.
    pub default_top_k: usize,
    /// Upper bound for a requested `top_k`.
    pub max_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dim: 384,
            model_dir: None,
            default_top_k: 3,
            max_top_k: 50,
        }
    }
}

/// On-disk layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Index directory, relative to `data_dir` unless absolute.
    pub index_dir: String,
    /// Upload directory, relative to `data_dir` unless absolute.
    pub upload_dir: String,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: "index".to_string(),
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Skills vocabulary configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Terms matched in addition to the built-in vocabulary.
    pub extra: Vec<String>,
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn resolve_under(base: &Path, path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
