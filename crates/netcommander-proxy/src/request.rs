//! Proxy request construction.
//!
//! Builds the JSON payload and HTTP request for the proxy without doing any
//! I/O. Both operations share the same payload shape and differ only in the
//! path appended to the endpoint.

use netcommander_core::device::NodeRef;
use netcommander_core::{Credentials, DeviceSet, Element, Error};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use url::Url;

use crate::Result;

/// Proxy operation, selecting the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOperation {
    /// Ask the proxy whether a request is acceptable
    Validate,
    /// Execute the request and stream per-device results
    Netconf,
}

impl ProxyOperation {
    /// Path segment appended to the endpoint.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Netconf => "netconf",
        }
    }
}

/// A command body supplied either as raw XML text or as a built tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Unparsed XML text
    Text(String),
    /// Already-parsed element tree
    Tree(Element),
}

impl RequestBody {
    /// Parse the body into an element tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if raw text does not parse.
    pub fn into_element(self) -> Result<Element> {
        match self {
            Self::Tree(element) => Ok(element),
            Self::Text(text) => Element::parse(&text)
                .map_err(|e| Error::MalformedRequest(format!("request is not valid XML: {e}"))),
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Element> for RequestBody {
    fn from(element: Element) -> Self {
        Self::Tree(element)
    }
}

/// JSON body sent to every proxy endpoint.
#[derive(Debug, Serialize)]
pub struct ProxyPayload<'a> {
    /// Device login
    pub username: &'a str,
    /// Device password
    pub password: &'a str,
    /// Device port
    pub port: u16,
    /// Target devices
    pub nodes: Vec<NodeRef<'a>>,
    /// Serialized XML request
    pub request: String,
}

/// A fully built proxy request, ready to send.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method (always `POST`)
    pub method: Method,
    /// Absolute URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Serialized JSON payload
    pub body: Vec<u8>,
}

impl ProxyRequest {
    /// Turn this into a `reqwest` request on the given client.
    #[must_use]
    pub fn into_reqwest(self, http: &Client) -> RequestBuilder {
        http.request(self.method, self.url)
            .headers(self.headers)
            .body(self.body)
    }
}

/// Assembles proxy requests against one endpoint.
#[derive(Debug, Clone)]
pub struct ProxyRequestBuilder {
    endpoint: Url,
    user_agent: HeaderValue,
}

impl ProxyRequestBuilder {
    /// Create a builder for `endpoint`, identifying as `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the user agent is not a valid header
    /// value.
    pub fn new(endpoint: Url, user_agent: &str) -> Result<Self> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| Error::ConfigError(format!("Invalid user agent `{user_agent}`: {e}")))?;
        Ok(Self {
            endpoint,
            user_agent,
        })
    }

    /// Base endpoint requests are built against.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build a `POST {endpoint}/{operation}` request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if a text body does not parse, or
    /// [`Error::InvalidEndpoint`] if the path cannot be joined.
    pub fn build(
        &self,
        credentials: &Credentials,
        devices: &DeviceSet,
        body: impl Into<RequestBody>,
        operation: ProxyOperation,
    ) -> Result<ProxyRequest> {
        let request = body.into().into_element()?;
        let payload = ProxyPayload {
            username: credentials.username(),
            password: credentials.password(),
            port: credentials.port(),
            nodes: devices.as_nodes(),
            request: request.to_xml_string(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| Error::MalformedRequest(format!("Failed to encode payload: {e}")))?;

        let url = self.endpoint.join(operation.path()).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid proxy path `{}`: {err}", operation.path()))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(ProxyRequest {
            method: Method::POST,
            url,
            headers,
            body,
        })
    }
}
