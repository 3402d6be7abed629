//! Configuration loading and management

mod provider;
mod settings;

pub use provider::ProviderConfig;
pub use settings::{ColorScheme, Settings};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ProviderKind;

/// Config file location relative to a project directory or the home directory
pub const CONFIG_PATH: &str = ".termdeck/config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Provider overrides keyed by provider name
    #[serde(default)]
    pub provider: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        for name in config.unknown_providers() {
            tracing::warn!(provider = %name, path = %path.display(), "ignoring unknown provider section");
        }

        Ok(config)
    }

    /// Load configuration for a project directory
    /// Looks for: <dir>/.termdeck/config.toml, then ~/.termdeck/config.toml
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let project_path = dir.join(CONFIG_PATH);
        if project_path.exists() {
            return Self::from_file(&project_path);
        }

        if let Some(global_path) = Self::global_path() {
            if global_path.exists() {
                return Self::from_file(&global_path);
            }
        }

        Ok(Self::default())
    }

    /// `~/.termdeck/config.toml`, if a home directory is known
    pub fn global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_PATH))
    }

    /// Overrides for a provider (empty when not configured)
    pub fn provider(&self, kind: ProviderKind) -> ProviderConfig {
        self.provider
            .get(kind.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// `[provider.<name>]` sections that name no known provider
    pub fn unknown_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .provider
            .keys()
            .map(String::as_str)
            .filter(|name| name.parse::<ProviderKind>().is_err())
            .collect();
        names.sort_unstable();
        names
    }
}
