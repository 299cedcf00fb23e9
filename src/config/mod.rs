//! Settings for the chat client.
//!
//! Loaded from `config.toml` in the platform config directory (see
//! [`crate::utils::get_config_path`]), then overridden by `OLLAMA_API_BASE_URL`,
//! `OLLAMA_MODEL` and `OLLAMA_CHAT_DATA_DIR` when set.

pub mod settings;

pub use settings::{DEFAULT_API_BASE_URL, Settings};
