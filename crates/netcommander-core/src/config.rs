//! Configuration for connecting to the NETCONF proxy.
//!
//! Defaults are resolved once by the application (optionally from the
//! environment via [`ProxyConfig::from_env`]) and passed to the client
//! constructor. Nothing in the library reads the environment implicitly.

use crate::client::{HttpConfig, DEFAULT_CONNECT_TIMEOUT, PROXY_DEFAULT_TIMEOUT};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable naming the proxy endpoint
pub const ENDPOINT_ENV: &str = "NETCONF_PROXY_ENDPOINT";

/// Environment variable toggling strict TLS hostname checking
pub const ASSERT_HOSTNAME_ENV: &str = "SSL_ASSERT_HOSTNAME";

/// Endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/v2";

/// User agent sent to the proxy unless overridden
pub const DEFAULT_USER_AGENT: &str = concat!("netcommander-rs/", env!("CARGO_PKG_VERSION"));

/// Configuration for a proxy client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProxyConfig {
    /// Proxy base URL, e.g. `https://proxy.example.com/v2`
    #[validate(url)]
    pub endpoint: String,

    /// Request timeout in seconds, covering the full streamed body
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[validate(range(min = 1, max = 120))]
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whether the proxy certificate must match its host name. Turning
    /// this off still validates the certificate chain.
    #[serde(default = "default_verify_hostname")]
    pub verify_hostname: bool,

    /// Client identifier sent as `User-Agent`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_request_timeout_secs() -> u64 {
    PROXY_DEFAULT_TIMEOUT
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_verify_hostname() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ProxyConfig {
    /// Create a new configuration for the given proxy endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Resolve a configuration from `NETCONF_PROXY_ENDPOINT` and
    /// `SSL_ASSERT_HOSTNAME`.
    ///
    /// Meant to be called once at application startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured endpoint is not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        let endpoint =
            std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let verify_hostname = std::env::var(ASSERT_HOSTNAME_ENV)
            .map(|value| parse_tls_flag(&value))
            .unwrap_or(true);

        Ok(Self::new(endpoint)?.with_verify_hostname(verify_hostname))
    }

    /// Set whether the certificate host name is checked.
    #[must_use]
    pub const fn with_verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set connect timeout in seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Set the client identifier.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub const fn http_config(&self) -> HttpConfig {
        HttpConfig::new()
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_verify_hostname(self.verify_hostname)
    }

    /// Parse the endpoint as a base URL that later path segments append to.
    ///
    /// A trailing slash is added so that joining `netconf` onto
    /// `http://host/v2` yields `http://host/v2/netconf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid proxy endpoint: {e}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            verify_hostname: default_verify_hostname(),
            user_agent: default_user_agent(),
        }
    }
}

fn parse_tls_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0")
}
