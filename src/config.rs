use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::model::Mode;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

pub const ENV_API_URL: &str = "PORTABLE_RAG_API_URL";
pub const ENV_MODE: &str = "PORTABLE_RAG_MODE";
pub const ENV_LOG: &str = "PORTABLE_RAG_LOG";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_url: default_api_url(),
            mode: Mode::Local,
            log_filter: None,
        }
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Remember the last chosen mode across sessions.
    ///
    /// `path` overrides the default location, as `--config` does.
    pub fn save_mode(path: Option<&Path>, mode: Mode) -> Result<()> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        let mut config = Self::load_from(&config_path).unwrap_or_else(|_| Self::new());
        config.mode = mode;
        config.save_to(&config_path)
    }

    /// Apply environment overrides on top of file values.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(mode) = var(ENV_MODE) {
            match Mode::from_str(&mode) {
                Some(mode) => self.mode = mode,
                None => tracing::warn!(value = %mode, "ignoring unknown {}", ENV_MODE),
            }
        }
        if let Some(filter) = var(ENV_LOG) {
            self.log_filter = Some(filter);
        }
        self
    }

    /// Base URL without trailing slashes.
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("portable-rag").join("config.json"))
    }
}
