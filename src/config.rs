//! Application configuration: environment variable loading and validation.

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub briq: BriqConfig,
    pub platform: PlatformConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Briq gateway configuration
#[derive(Debug, Clone)]
pub struct BriqConfig {
    pub api_url: String,
    pub api_username: String,
    pub api_password: String,
    /// Shared webhook secret. Absent means webhook processing is disabled
    /// and every delivery is rejected.
    pub webhook_secret: Option<String>,
    /// Maximum accepted signature timestamp skew, in seconds.
    pub signature_tolerance_secs: u64,
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

/// Commerce platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub api_url: String,
    pub api_key: String,
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            briq: BriqConfig::from_env()?,
            platform: PlatformConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.briq.validate()?;
        self.platform.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl BriqConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(BriqConfig {
            api_url: env::var("BRIQ_API_URL")
                .map_err(|_| ConfigError::MissingVariable("BRIQ_API_URL".to_string()))?,
            api_username: env::var("BRIQ_API_USERNAME")
                .map_err(|_| ConfigError::MissingVariable("BRIQ_API_USERNAME".to_string()))?,
            api_password: env::var("BRIQ_API_PASSWORD")
                .map_err(|_| ConfigError::MissingVariable("BRIQ_API_PASSWORD".to_string()))?,
            webhook_secret: env::var("BRIQ_WEBHOOK_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty()),
            signature_tolerance_secs: env::var("BRIQ_SIGNATURE_TOLERANCE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("BRIQ_SIGNATURE_TOLERANCE_SECS".to_string())
                })?,
            request_timeout: env::var("BRIQ_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BRIQ_REQUEST_TIMEOUT".to_string()))?,
            max_retries: env::var("BRIQ_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BRIQ_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "BRIQ_API_URL must be a valid URL".to_string(),
            ));
        }

        if self.api_username.is_empty() {
            return Err(ConfigError::InvalidValue("BRIQ_API_USERNAME".to_string()));
        }

        if self.signature_tolerance_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "BRIQ_SIGNATURE_TOLERANCE_SECS cannot be 0".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "BRIQ_REQUEST_TIMEOUT cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PlatformConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PlatformConfig {
            api_url: env::var("PLATFORM_API_URL")
                .map_err(|_| ConfigError::MissingVariable("PLATFORM_API_URL".to_string()))?,
            api_key: env::var("PLATFORM_API_KEY")
                .map_err(|_| ConfigError::MissingVariable("PLATFORM_API_KEY".to_string()))?,
            request_timeout: env::var("PLATFORM_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PLATFORM_REQUEST_TIMEOUT".to_string()))?,
            max_retries: env::var("PLATFORM_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PLATFORM_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_API_URL must be a valid URL".to_string(),
            ));
        }

        if self.api_key.is_empty() {
            return Err(ConfigError::InvalidValue("PLATFORM_API_KEY".to_string()));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
