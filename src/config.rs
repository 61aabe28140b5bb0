//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model used for recommendation generation.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Default base URL of the generation service.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";

/// Default timeout for a single generation call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the external generation service.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Bearer API key.
    pub api_key: SecretString,
    /// Base URL (scheme + host, no trailing path).
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Hard bound on a single call; on expiry the call counts as failed.
    pub timeout: Duration,
}

impl GenerationConfig {
    /// Read configuration from `GROQ_*` environment variables.
    ///
    /// Only the API key is required; everything else has a documented default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GROQ_API_KEY".into()))?;

        let base_url =
            std::env::var("GROQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let timeout_secs = match std::env::var("GROQ_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "GROQ_TIMEOUT_SECS".into(),
                message: e.to_string(),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Server-side configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Path to the local database file.
    pub db_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("WELLWORK_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let db_path = std::env::var("WELLWORK_DB_PATH")
            .unwrap_or_else(|_| "./data/wellwork.db".to_string());
        Self { port, db_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults() {
        // Env vars are unset in the test environment.
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_path, "./data/wellwork.db");
    }
}
