//! Engine configuration, loaded from TOML with defaults for every field.
//!
//! ```toml
//! data_dir = "/var/lib/knowledge-cascade"   # omit for an in-memory store
//! max_content_bytes = 1048576
//! max_name_len = 256
//! ```

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(kc::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(kc::config::parse),
        help("Check the TOML syntax. Unknown keys are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(kc::config::invalid), help("{message}"))]
    Invalid { message: String },

    #[error("cannot determine a data directory")]
    #[diagnostic(
        code(kc::config::no_home),
        help("Set HOME or XDG_DATA_HOME, or pass --data-dir explicitly.")
    )]
    NoHome,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Size limits applied to every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Largest accepted content payload, in bytes.
    pub max_content_bytes: usize,
    /// Longest accepted knowledge name, in bytes.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_content_bytes: default_max_content_bytes(),
            max_name_len: default_max_name_len(),
        }
    }
}

/// Configuration for the knowledge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Data directory for persistence. `None` for memory-only mode.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

fn default_max_content_bytes() -> usize {
    1024 * 1024
}
fn default_max_name_len() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_content_bytes: default_max_content_bytes(),
            max_name_len: default_max_name_len(),
        }
    }
}

impl EngineConfig {
    /// A memory-only config with default limits.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A persistent config rooted at `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every write fail.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_content_bytes == 0 {
            return Err(ConfigError::Invalid {
                message: "max_content_bytes must be > 0".into(),
            });
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::Invalid {
                message: "max_name_len must be > 0".into(),
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_content_bytes: self.max_content_bytes,
            max_name_len: self.max_name_len,
        }
    }

    /// `$XDG_DATA_HOME/knowledge-cascade`, falling back to
    /// `$HOME/.local/share/knowledge-cascade`.
    pub fn default_data_dir() -> ConfigResult<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            if !xdg.is_empty() {
                return Ok(PathBuf::from(xdg).join("knowledge-cascade"));
            }
        }
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::NoHome)?;
        Ok(home.join(".local/share").join("knowledge-cascade"))
    }
}
