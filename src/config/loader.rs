//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::AppConfig;

/// Where configuration comes from.
#[derive(Debug)]
enum ConfigSource {
    /// Default locations in priority order; none of them needs to exist.
    Search(Vec<PathBuf>),
    /// A file named on the command line, which must exist.
    Explicit(PathBuf),
}

/// Configuration loader for `office-relay`.
#[derive(Debug)]
pub struct ConfigLoader {
    source: ConfigSource,
}

impl ConfigLoader {
    /// Create a loader that searches `.office-relay.toml`, then the user
    /// config directory.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from(".office-relay.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("office-relay").join("config.toml"));
        }

        Self {
            source: ConfigSource::Search(search_paths),
        }
    }

    /// Create a loader for one required config file.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: ConfigSource::Explicit(path),
        }
    }

    /// Load configuration.
    ///
    /// Searched locations fall back to defaults when none exists; an
    /// explicit path must be readable.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        match &self.source {
            ConfigSource::Explicit(path) => Self::load_from_path(path),
            ConfigSource::Search(paths) => match paths.iter().find(|p| p.exists()) {
                Some(path) => Self::load_from_path(path),
                None => {
                    tracing::debug!("No config file found, using defaults");
                    Ok(AppConfig::default())
                }
            },
        }
    }

    fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
