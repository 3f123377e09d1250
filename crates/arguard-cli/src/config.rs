//! `arguard.toml` loading.
//!
//! ```toml
//! search-paths = ["src", "vendor"]
//!
//! [analysis]
//! follow-imports = true
//! report-contracts = false
//! report-errors = false
//! ```

use arguard_contracts::AnalyzerConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "arguard.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of `arguard.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directories units are resolved against, relative to the file
    pub search_paths: Vec<PathBuf>,
    pub analysis: AnalyzerConfig,
}

impl ProjectConfig {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: ProjectConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for search_path in &mut config.search_paths {
                if search_path.is_relative() {
                    *search_path = base.join(&*search_path);
                }
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Load `explicit`, or `arguard.toml` in `dir` when it exists.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = dir.join(CONFIG_FILE);
        if implicit.is_file() {
            tracing::debug!(path = %implicit.display(), "using project configuration");
            Self::load(&implicit)
        } else {
            Ok(Self::default())
        }
    }
}
