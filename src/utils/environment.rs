use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const APP_DIR_NAME: &str = "ollama-chat";
pub const CONFIG_FILENAME: &str = "config.toml";

/// Explicit config file path
pub const CONFIG_ENV: &str = "OLLAMA_CHAT_CONFIG";
/// Data directory override (chat files live under `<dir>/chats`)
pub const DATA_DIR_ENV: &str = "OLLAMA_CHAT_DATA_DIR";
pub const API_BASE_URL_ENV: &str = "OLLAMA_API_BASE_URL";
pub const MODEL_ENV: &str = "OLLAMA_MODEL";

/// Non-empty value of an environment variable
pub fn env_override(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Config file location: `$OLLAMA_CHAT_CONFIG`, else `<config dir>/ollama-chat/config.toml`
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = env_override(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir().context("Failed to get platform config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILENAME))
}

/// Default data directory: `<data dir>/ollama-chat`
pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Failed to get platform data directory")?;
    Ok(base.join(APP_DIR_NAME))
}
