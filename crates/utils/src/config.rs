//! Runtime configuration read from the environment (and an optional `.env`).

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub const DATABASE_URL_VAR: &str = "ROUTEDESK_DATABASE_URL";
pub const BLOB_DIR_VAR: &str = "ROUTEDESK_BLOB_DIR";
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const MODEL_VAR: &str = "ROUTEDESK_MODEL";

const DEFAULT_DATABASE_URL: &str = "sqlite://routedesk.db?mode=rwc";
const DEFAULT_BLOB_DIR: &str = "./blobs";
const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_API_KEY";
const MIN_API_KEY_LEN: usize = 11;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub database_url: String,
    pub blob_dir: PathBuf,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = match lookup(DATABASE_URL_VAR) {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: DATABASE_URL_VAR,
                });
            }
            Some(url) => url,
            None => DEFAULT_DATABASE_URL.to_string(),
        };

        let blob_dir = lookup(BLOB_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_DIR));

        Ok(Self {
            database_url,
            blob_dir,
            api_key: lookup(API_KEY_VAR),
            model: lookup(MODEL_VAR).filter(|m| !m.trim().is_empty()),
        })
    }

    /// The hosted-model credential, or `None` when unset or a placeholder.
    pub fn assistant_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| *key != PLACEHOLDER_API_KEY && key.len() >= MIN_API_KEY_LEN)
    }
}
