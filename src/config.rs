use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Subscription Manager API, without a trailing slash.
    pub base_url: String,
    /// Directory holding the persisted credential store.
    pub data_dir: String,
    /// Total per-request timeout, applied to every call including refresh.
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            data_dir: "./data".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let base_url = std::env::var("SUBMAN_BASE_URL").unwrap_or(defaults.base_url);
        let data_dir = std::env::var("SUBMAN_DATA_DIR").unwrap_or(defaults.data_dir);
        let timeout_seconds = std::env::var("SUBMAN_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_seconds);

        let config = Config {
            base_url: base_url.trim_end_matches('/').to_string(),
            data_dir,
            timeout_seconds,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "SUBMAN_BASE_URL cannot be empty".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "SUBMAN_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
