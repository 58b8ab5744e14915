//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on every backend call.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend project URL, e.g. `https://xyz.supabase.co`
    pub backend_url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    /// Base for public storage URLs
    pub storage_base_url: String,
    /// Timeout applied to every backend call
    pub request_timeout: Duration,
    /// Where to persist the session between runs; memory only when unset
    pub session_file: Option<PathBuf>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: "test_anon_key".to_string(),
            storage_base_url: "http://localhost:54321/storage/v1/object/public".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_file: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend_url = env::var("SUPABASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::Invalid("SUPABASE_URL", backend_url));
        }

        let request_timeout = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECS", raw)),
            },
            Err(_) => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            storage_base_url: env::var("STORAGE_BASE_URL")
                .unwrap_or_else(|_| format!("{}/storage/v1/object/public", backend_url)),
            anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            session_file: env::var("SESSION_FILE").ok().map(PathBuf::from),
            request_timeout,
            backend_url,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
