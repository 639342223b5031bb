// Process configuration, read once at startup from the environment
// (optionally seeded from a `.env` file).
use crate::chat::ThinkDelimiters;
use crate::error::{AppError, Result};
use std::env;

pub const ENV_STORE_URL: &str = "STORE_URL";
pub const ENV_STORE_API_KEY: &str = "STORE_API_KEY";
pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_OPENROUTER_BASE_URL: &str = "OPENROUTER_BASE_URL";
pub const ENV_CHAT_MODEL: &str = "CHAT_MODEL";
pub const ENV_THINK_OPEN: &str = "CHAT_THINK_OPEN";
pub const ENV_THINK_CLOSE: &str = "CHAT_THINK_CLOSE";

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "mistralai/mistral-small-3.2-24b-instruct:free";

#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_api_key: String,
    /// Only the assistant needs it, so a missing key is reported lazily.
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub chat_model: String,
    pub think: ThinkDelimiters,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{} is not set", key)))
        };

        let defaults = ThinkDelimiters::default();
        Ok(Config {
            store_url: required(ENV_STORE_URL)?,
            store_api_key: required(ENV_STORE_API_KEY)?,
            openrouter_api_key: get(ENV_OPENROUTER_API_KEY),
            openrouter_base_url: get(ENV_OPENROUTER_BASE_URL)
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            chat_model: get(ENV_CHAT_MODEL).unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            think: ThinkDelimiters::new(
                get(ENV_THINK_OPEN).unwrap_or(defaults.open),
                get(ENV_THINK_CLOSE).unwrap_or(defaults.close),
            ),
        })
    }

    pub fn require_openrouter_key(&self) -> Result<&str> {
        self.openrouter_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config(format!("{} is not set", ENV_OPENROUTER_API_KEY)))
    }
}
