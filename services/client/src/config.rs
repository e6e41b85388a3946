//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: String,
    pub cognito_region: String,
    pub cognito_client_id: String,
    pub cognito_endpoint: String,
    pub token_store_path: PathBuf,
    pub page_size: usize,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- REST API ---
        let api_base_url = required("API_BASE_URL")?.trim_end_matches('/').to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }
        let api_key = required("API_KEY")?;

        // --- Identity provider ---
        let cognito_region = lookup("COGNITO_REGION").unwrap_or_else(|| "eu-central-1".to_string());
        let cognito_client_id = required("COGNITO_CLIENT_ID")?;
        let cognito_endpoint = lookup("COGNITO_ENDPOINT")
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", cognito_region));

        // --- Local state ---
        let token_store_path = lookup("TOKEN_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.study/auth_tokens.json"));

        let page_size_str = lookup("PAGE_SIZE").unwrap_or_else(|| "10".to_string());
        let page_size = page_size_str
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=100).contains(n))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PAGE_SIZE".to_string(),
                    format!("'{}' is not a number between 1 and 100", page_size_str),
                )
            })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            api_key,
            cognito_region,
            cognito_client_id,
            cognito_endpoint,
            token_store_path,
            page_size,
            log_level,
        })
    }
}
