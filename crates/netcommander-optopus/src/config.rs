//! Configuration for the Optopus backend.

use netcommander_core::client::{HttpConfig, DIRECTORY_DEFAULT_TIMEOUT};
use netcommander_core::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable naming the Optopus endpoint
pub const ENDPOINT_ENV: &str = "OPTOPUS_ENDPOINT";

/// User agent sent to Optopus unless overridden
pub const DEFAULT_USER_AGENT: &str = concat!("netcommander-optopus/", env!("CARGO_PKG_VERSION"));

/// Configuration for an Optopus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OptopusConfig {
    /// Optopus base URL, e.g. `https://optopus.example.com`
    #[validate(url)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Client identifier sent as `User-Agent`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout_secs() -> u64 {
    DIRECTORY_DEFAULT_TIMEOUT
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl OptopusConfig {
    /// Create a new configuration for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid Optopus configuration: {e}")))?;

        Ok(config)
    }

    /// Resolve a configuration from `OPTOPUS_ENDPOINT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|_| Error::ConfigError(format!("{ENDPOINT_ENV} is not set")))?;
        Self::new(endpoint)
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the client identifier.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub const fn http_config(&self) -> HttpConfig {
        HttpConfig::new().with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Parse the endpoint as a base URL for `api/...` paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid Optopus endpoint: {e}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optopus_config_new() {
        let config = OptopusConfig::new("https://optopus.example.com").unwrap();
        assert_eq!(config.timeout_secs, DIRECTORY_DEFAULT_TIMEOUT);
        assert!(config.user_agent.starts_with("netcommander-optopus/"));
        assert_eq!(
            config.http_config().timeout,
            Duration::from_secs(DIRECTORY_DEFAULT_TIMEOUT)
        );
    }

    #[test]
    fn test_optopus_config_invalid_url() {
        let err = OptopusConfig::new("optopus").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_optopus_config_builder() {
        let config = OptopusConfig::new("https://optopus.example.com")
            .unwrap()
            .with_timeout(5)
            .with_user_agent("switcheroo");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.user_agent, "switcheroo");
    }

    #[test]
    fn test_parse_endpoint_keeps_prefix() {
        let config = OptopusConfig::new("https://tools.example.com/optopus").unwrap();
        let url = config.parse_endpoint().unwrap();
        assert_eq!(url.join("api/search").unwrap().path(), "/optopus/api/search");
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: OptopusConfig =
            serde_json::from_str(r#"{"endpoint":"http://optopus"}"#).unwrap();
        assert_eq!(config.timeout_secs, DIRECTORY_DEFAULT_TIMEOUT);
        assert!(config.validate().is_ok());
    }
}
