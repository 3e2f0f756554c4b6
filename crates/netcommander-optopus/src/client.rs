//! Asynchronous Optopus directory client.

use async_trait::async_trait;
use netcommander_core::client::HttpConfig;
use netcommander_core::{Device, DeviceDirectory, DeviceSet, Error};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::OptopusConfig;
use crate::models::{ActiveNode, SearchParams, SearchResults};
use crate::Result;

const BACKEND: &str = "optopus";
const SEARCH_PATH: &str = "api/search";
const ACTIVE_NODES_PATH: &str = "api/network_nodes/active";

/// Builder for [`OptopusDirectory`].
#[derive(Debug, Clone)]
pub struct OptopusDirectoryBuilder {
    config: OptopusConfig,
    http_config: HttpConfig,
    dry_run: bool,
}

impl OptopusDirectoryBuilder {
    /// Create a new builder with the provided Optopus base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::from_config(OptopusConfig::new(endpoint)?))
    }

    /// Create a builder from a resolved configuration.
    #[must_use]
    pub fn from_config(config: OptopusConfig) -> Self {
        Self {
            http_config: config.http_config(),
            config,
            dry_run: false,
        }
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Log the URLs that would be fetched and return empty results instead
    /// of contacting Optopus.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint or HTTP client cannot
    /// be set up.
    pub fn build(self) -> Result<OptopusDirectory> {
        let base_url = self.config.parse_endpoint()?;
        let http = self.http_config.build_client(&self.config.user_agent)?;

        Ok(OptopusDirectory {
            http,
            base_url,
            dry_run: self.dry_run,
        })
    }
}

/// Device directory backed by an Optopus inventory service.
#[derive(Debug, Clone)]
pub struct OptopusDirectory {
    http: Client,
    base_url: Url,
    dry_run: bool,
}

impl OptopusDirectory {
    /// Create a new directory for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        OptopusDirectoryBuilder::new(endpoint)?.build()
    }

    /// Create a builder for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn builder(endpoint: impl Into<String>) -> Result<OptopusDirectoryBuilder> {
        OptopusDirectoryBuilder::new(endpoint)
    }

    /// Access the underlying base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns true if lookups only log their URL.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// URL a network node search for `query` fetches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the path cannot be joined.
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self.build_url(SEARCH_PATH)?;
        url.query_pairs_mut()
            .extend_pairs(SearchParams::network_nodes(query).to_pairs());
        Ok(url)
    }

    /// URL the active node listing fetches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the path cannot be joined.
    pub fn active_nodes_url(&self) -> Result<Url> {
        self.build_url(ACTIVE_NODES_PATH)
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid Optopus path `{path}`: {err}")))
    }

    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        info!(path = url.path(), "Optopus request");

        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_to_error(status, &text));
        }

        response.json::<T>().await.map_err(|err| Error::DirectoryError {
            backend: BACKEND.to_string(),
            message: format!("Failed to parse response for `{}`: {err}", url.path()),
        })
    }
}

#[async_trait]
impl DeviceDirectory for OptopusDirectory {
    async fn search(&self, query: &str) -> Result<DeviceSet> {
        let url = self.search_url(query)?;
        if self.dry_run {
            info!(%url, "Optopus dry run");
            return Ok(DeviceSet::new());
        }

        let results: SearchResults = self.get_json(url).await?;
        let devices = results.into_devices();
        debug!(query, devices = devices.len(), "Optopus search");
        Ok(devices)
    }

    async fn all_devices(&self) -> Result<DeviceSet> {
        let url = self.active_nodes_url()?;
        if self.dry_run {
            info!(%url, "Optopus dry run");
            return Ok(DeviceSet::new());
        }

        let nodes: Vec<ActiveNode> = self.get_json(url).await?;
        let devices: DeviceSet = nodes.into_iter().map(Device::from).collect();
        debug!(devices = devices.len(), "Optopus active nodes");
        Ok(devices)
    }
}

fn map_status_to_error(status: StatusCode, text: &str) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("Optopus temporarily unavailable: {text}"))
        }
        _ => Error::DirectoryError {
            backend: BACKEND.to_string(),
            message: format!("HTTP {status}: {text}"),
        },
    }
}
