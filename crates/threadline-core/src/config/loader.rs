//! Layered configuration loading

use super::env_loader;
use super::file_loader;
use super::model::{ClientConfig, ConfigOverlay};
use crate::error::ClientResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Configuration from a file
    File(PathBuf),
    /// Configuration from `THREADLINE_*` environment variables
    Environment,
    /// Explicit variables, same names as the environment
    Vars(HashMap<String, String>),
    /// An already-built overlay, e.g. from command line flags
    Overlay(ConfigOverlay),
    /// Default configuration
    Default,
}

/// Configuration loader with support for multiple sources
///
/// Sources are applied in the order they were added; later sources win.
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    /// Add environment variables source
    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    pub fn with_vars(self, vars: HashMap<String, String>) -> Self {
        self.add_source(ConfigSource::Vars(vars))
    }

    pub fn with_overlay(self, overlay: ConfigOverlay) -> Self {
        self.add_source(ConfigSource::Overlay(overlay))
    }

    /// Add default configuration source
    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    /// Load configuration from all sources
    pub fn load(self) -> ClientResult<ClientConfig> {
        let mut config = ClientConfig::default();

        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    tracing::debug!(path = %path.display(), "loading config file");
                    config.merge(file_loader::load_from_file(&path)?);
                }
                ConfigSource::Environment => {
                    tracing::debug!("loading config from environment");
                    config.merge(env_loader::load_from_env()?);
                }
                ConfigSource::Vars(vars) => config.merge(env_loader::load_from_vars(vars)?),
                ConfigSource::Overlay(overlay) => config.merge(overlay),
                ConfigSource::Default => config = ClientConfig::default(),
            }
        }

        config.validate()?;
        tracing::debug!(api_url = %config.api_url, assistant = %config.assistant_id, "config loaded");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// `~/.config/threadline/config.toml` when a config dir exists
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("threadline").join("config.toml"))
}
