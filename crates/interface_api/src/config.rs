//! API configuration

use serde::Deserialize;

/// API configuration
///
/// Every field can be overridden with a `CONDO_`-prefixed environment
/// variable, e.g. `CONDO_PORT=9090` or `CONDO_BANK_API_KEY=...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Bank data provider base URL
    pub bank_api_base_url: String,
    pub bank_api_key: String,
    pub bank_timeout_secs: u64,
    /// Retries per provider call before an account is reported as failed
    pub bank_max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/condo".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            bank_api_base_url: "http://localhost:9000/v1".to_string(),
            bank_api_key: String::new(),
            bank_timeout_secs: 30,
            bank_max_retries: 3,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `CONDO_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("CONDO").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True while the development JWT secret is still in place
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == Self::default().jwt_secret
    }
}
