//! Asynchronous NETCONF proxy client.

use std::sync::{Arc, RwLock};

use netcommander_core::client::HttpConfig;
use netcommander_core::config::ProxyConfig;
use netcommander_core::{Credentials, DeviceDirectory, DeviceSet, Error, XmlNormalizer};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info};

use crate::envelope::RpcEnvelope;
use crate::models::{RawResponse, ResultRecord};
use crate::request::{ProxyOperation, ProxyRequestBuilder, RequestBody};
use crate::stream::{Outcome, RecordStream};
use crate::Result;

/// Builder for [`ProxyClient`].
#[derive(Clone)]
pub struct ProxyClientBuilder {
    config: ProxyConfig,
    http_config: HttpConfig,
    credentials: Option<Arc<Credentials>>,
    directory: Option<Arc<dyn DeviceDirectory>>,
    normalizer: XmlNormalizer,
}

impl ProxyClientBuilder {
    /// Create a new builder for the given proxy endpoint.
    ///
    /// The URL should include the protocol, host and base path (e.g.
    /// `https://proxy.example.com/v2`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is not a valid URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::from_config(ProxyConfig::new(endpoint)?))
    }

    /// Create a builder from a resolved configuration.
    #[must_use]
    pub fn from_config(config: ProxyConfig) -> Self {
        Self {
            http_config: config.http_config(),
            config,
            credentials: None,
            directory: None,
            normalizer: XmlNormalizer::new(),
        }
    }

    /// Override the HTTP transport configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Credentials sent with every request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Directory used by [`ProxyClient::search`] and
    /// [`ProxyClient::all_devices`].
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DeviceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Hook that rewrites each payload before it is parsed.
    #[must_use]
    pub fn with_pre_parser<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.normalizer = self.normalizer.with_pre_parser(hook);
        self
    }

    /// Build the proxy client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the HTTP client or endpoint cannot
    /// be set up.
    pub fn build(self) -> Result<ProxyClient> {
        let http = self.http_config.build_client(&self.config.user_agent)?;
        let requests =
            ProxyRequestBuilder::new(self.config.parse_endpoint()?, &self.config.user_agent)?;

        Ok(ProxyClient {
            http,
            requests,
            credentials: self.credentials,
            directory: self.directory,
            normalizer: self.normalizer,
            last_errors: Arc::new(RwLock::new(Vec::new())),
        })
    }
}

/// Asynchronous client for a NETCONF proxy.
///
/// Each [`ProxyClient::run`] or [`ProxyClient::run_rpc`] call issues a single
/// HTTP request for the whole device set. Per-device failures are kept out
/// of the reply stream; once a stream has been drained they are readable
/// from [`RecordStream::failures`] and [`ProxyClient::last_errors`].
///
/// `last_errors` is shared by clones of a client and reflects whichever
/// stream drained last. Callers running several streams concurrently should
/// read each stream's own [`RecordStream::failures`] instead.
#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    requests: ProxyRequestBuilder,
    credentials: Option<Arc<Credentials>>,
    directory: Option<Arc<dyn DeviceDirectory>>,
    normalizer: XmlNormalizer,
    last_errors: Outcome,
}

impl ProxyClient {
    /// Create a new client for the given endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is invalid.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        ProxyClientBuilder::new(endpoint)?.build()
    }

    /// Start building a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is invalid.
    pub fn builder(endpoint: impl Into<String>) -> Result<ProxyClientBuilder> {
        ProxyClientBuilder::new(endpoint)
    }

    /// Base endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &url::Url {
        self.requests.endpoint()
    }

    /// Replace the credentials used for subsequent calls.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(Arc::new(credentials));
    }

    /// Replace the device directory.
    pub fn set_directory(&mut self, directory: Arc<dyn DeviceDirectory>) {
        self.directory = Some(directory);
    }

    /// Find devices through the configured directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDirectory`] if none is configured, or whatever the
    /// directory reports.
    pub async fn search(&self, query: &str) -> Result<DeviceSet> {
        self.directory()?.search(query).await
    }

    /// List every device known to the configured directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDirectory`] if none is configured, or whatever the
    /// directory reports.
    pub async fn all_devices(&self) -> Result<DeviceSet> {
        self.directory()?.all_devices().await
    }

    /// Failed records from the most recently drained stream.
    #[must_use]
    pub fn last_errors(&self) -> Vec<ResultRecord> {
        self.last_errors
            .read()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }

    /// Ask the proxy whether `body` is acceptable for `devices`.
    ///
    /// Does not touch [`ProxyClient::last_errors`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] carrying the raw response body on
    /// any non-2xx status, [`Error::MalformedRequest`] if `body` does not
    /// parse, or a transport error.
    pub async fn validate(
        &self,
        body: impl Into<RequestBody>,
        devices: &DeviceSet,
    ) -> Result<RawResponse> {
        let response = self.send(body.into(), devices, ProxyOperation::Validate).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(%status, "proxy rejected request");
            return Err(Error::ValidationError(body));
        }
        Ok(RawResponse { status, body })
    }

    /// Run `body` on every device and stream back the replies.
    ///
    /// Each reply's output is the device's XML payload with namespaces
    /// stripped.
    ///
    /// # Errors
    ///
    /// Fails before any I/O with [`Error::MalformedRequest`] or
    /// [`Error::MissingCredentials`]; otherwise with a transport error if the
    /// proxy cannot be reached or answers with a non-2xx status.
    pub async fn run(
        &self,
        body: impl Into<RequestBody>,
        devices: &DeviceSet,
    ) -> Result<RecordStream> {
        self.open_stream(body.into(), devices, false).await
    }

    /// Like [`ProxyClient::run`], but wraps `body` in `<rpc>` first and
    /// yields the first child element of each reply.
    ///
    /// # Errors
    ///
    /// Same as [`ProxyClient::run`].
    pub async fn run_rpc(
        &self,
        body: impl Into<RequestBody>,
        devices: &DeviceSet,
    ) -> Result<RecordStream> {
        let rpc = RpcEnvelope::wrap(body)?;
        self.open_stream(RequestBody::Tree(rpc), devices, true).await
    }

    async fn open_stream(
        &self,
        body: RequestBody,
        devices: &DeviceSet,
        unwrap_reply: bool,
    ) -> Result<RecordStream> {
        let response = self.send(body, devices, ProxyOperation::Netconf).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_to_error(status, text));
        }

        Ok(RecordStream::new(
            response,
            self.normalizer.clone(),
            unwrap_reply,
            Arc::clone(&self.last_errors),
        ))
    }

    async fn send(
        &self,
        body: RequestBody,
        devices: &DeviceSet,
        operation: ProxyOperation,
    ) -> Result<Response> {
        let credentials = self.credentials.as_deref().ok_or(Error::MissingCredentials)?;
        let request = self.requests.build(credentials, devices, body, operation)?;

        info!(
            path = operation.path(),
            devices = devices.len(),
            "proxy request"
        );
        request
            .into_reqwest(&self.http)
            .send()
            .await
            .map_err(Error::from)
    }

    fn directory(&self) -> Result<&dyn DeviceDirectory> {
        self.directory.as_deref().ok_or(Error::NoDirectory)
    }
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("proxy temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("proxy server error {status}: {text}"))
        }
        _ => Error::HttpError(format!("proxy error {status}: {text}")),
    }
}
