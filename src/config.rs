use thiserror::Error;
use url::Url;

use crate::constants::DEFAULT_EDIT_REASON;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Publisher configuration loaded from environment variables.
///
/// The base URL and API key may be empty; the client reports that as missing
/// settings when the key is tested instead of refusing to start.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub base_url: String,
    pub user_api_key: String,
    pub edit_reason: String,

    // Logging
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unrecognized value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_or_default("DISCOURSE_BASE_URL", ""),
            user_api_key: env_or_default("DISCOURSE_USER_API_KEY", ""),
            edit_reason: env_or_default("DISCOURSE_EDIT_REASON", DEFAULT_EDIT_REASON),
            log_format: parse_log_format(&env_or_default("LOG_FORMAT", "pretty"))?,
        })
    }

    /// Configuration pointing at nothing, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_url: String::new(),
            user_api_key: String::new(),
            edit_reason: DEFAULT_EDIT_REASON.to_string(),
            log_format: LogFormat::Pretty,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is set but is not an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Ok(());
        }
        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(ConfigError::InvalidValue {
                name: "DISCOURSE_BASE_URL".to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => Err(ConfigError::InvalidValue {
                name: "DISCOURSE_BASE_URL".to_string(),
                message: e.to_string(),
            }),
        }
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_log_format(value: &str) -> Result<LogFormat, ConfigError> {
    match value.to_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" | "structured" => Ok(LogFormat::Json),
        _ => Err(ConfigError::InvalidValue {
            name: "LOG_FORMAT".to_string(),
            message: format!("must be 'pretty' or 'json', got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormat::Json);
        assert_eq!(parse_log_format("structured").unwrap(), LogFormat::Json);
        assert!(parse_log_format("xml").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        std::env::remove_var("DISCOURSE_BASE_URL");
        std::env::remove_var("DISCOURSE_USER_API_KEY");
        std::env::remove_var("DISCOURSE_EDIT_REASON");
        std::env::remove_var("LOG_FORMAT");

        let config = Config::from_env().unwrap();
        assert!(config.base_url.is_empty());
        assert!(config.user_api_key.is_empty());
        assert_eq!(config.edit_reason, DEFAULT_EDIT_REASON);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_credentials() {
        std::env::set_var("DISCOURSE_BASE_URL", "https://forum.example.com");
        std::env::set_var("DISCOURSE_USER_API_KEY", "secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.base_url, "https://forum.example.com");
        assert_eq!(config.user_api_key, "secret");

        std::env::remove_var("DISCOURSE_BASE_URL");
        std::env::remove_var("DISCOURSE_USER_API_KEY");
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = Config::for_testing();
        assert!(config.validate().is_ok());

        config.base_url = "https://forum.example.com/".to_string();
        assert!(config.validate().is_ok());

        config.base_url = "ftp://forum.example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = "forum.example.com".to_string();
        assert!(config.validate().is_err());
    }
}
