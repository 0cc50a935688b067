#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Everything tunable about a session lives in one [`EngineConfig`], loaded
//! from TOML or JSON at startup. Missing sections and fields take their
//! defaults.
//!
//! ```toml
//! # sensorcfg.toml
//! [history]
//! max_depth = 200
//!
//! [tutorial]
//! enabled = true
//! graph_path = "tutorial.toml"
//!
//! [logging]
//! filter = "sensorcfg=debug"
//! json = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tutorial::{GraphError, TutorialGraph};
use crate::undo::HistoryConfig;

/// Errors from loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorialConfig {
    /// Show the tutorial when the session starts.
    pub enabled: bool,
    /// Graph file to use instead of the built-in walkthrough.
    pub graph_path: Option<PathBuf>,
}

impl Default for TutorialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            graph_path: None,
        }
    }
}

impl TutorialConfig {
    /// The configured graph, or the built-in walkthrough.
    pub fn load_graph(&self) -> Result<TutorialGraph, GraphError> {
        match &self.graph_path {
            Some(path) => TutorialGraph::load(path),
            None => Ok(TutorialGraph::walkthrough()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub tutorial: TutorialConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    /// Load by extension (`.json` or TOML) and reject invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path)?,
            _ => Self::from_toml_file(path)?,
        };
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Problems with the values. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.history.max_depth == Some(0) {
            errors.push("history.max_depth must be > 0".into());
        }

        if self.logging.filter.trim().is_empty() {
            errors.push("logging.filter must not be empty".into());
        }

        if self
            .tutorial
            .graph_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            errors.push("tutorial.graph_path must not be empty when set".into());
        }

        errors
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
