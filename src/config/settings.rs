use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::utils::environment::{
    API_BASE_URL_ENV, DATA_DIR_ENV, MODEL_ENV, default_data_dir, env_override, get_config_path,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:11434";

/// User settings, read from `config.toml`
///
/// ```toml
/// ollama_api_base_url = "http://gpu-box:11434"
/// default_model = "llama2"
/// title_auto_generate = true
///
/// [options]
/// temperature = 0.7
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ollama_api_base_url: String,
    /// Sent verbatim as the `Authorization` header
    pub auth_header: Option<String>,
    pub default_model: Option<String>,
    pub title_auto_generate: bool,
    /// Model options passed through to the API (`temperature`, `num_ctx`, ...)
    pub options: Option<toml::Table>,
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_header: None,
            default_model: None,
            title_auto_generate: true,
            options: None,
            data_dir: None,
        }
    }
}

impl Settings {
    /// Load from the default location and apply environment overrides.
    /// A missing config file means defaults.
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;
        let mut settings = Self::load_from(&path)?;
        settings.apply_overrides(env_override);
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `OLLAMA_API_BASE_URL`, `OLLAMA_MODEL` and `OLLAMA_CHAT_DATA_DIR`
    /// as looked up by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_BASE_URL_ENV) {
            self.ollama_api_base_url = url;
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.default_model = Some(model);
        }
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// API base URL without a trailing slash
    pub fn api_base_url(&self) -> &str {
        self.ollama_api_base_url.trim_end_matches('/')
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    /// `options` as JSON for request bodies
    pub fn options_json(&self) -> Option<Value> {
        self.options.as_ref().and_then(|table| serde_json::to_value(table).ok())
    }
}
