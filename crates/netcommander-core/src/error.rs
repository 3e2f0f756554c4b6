//! Error types for netcommander operations.
//!
//! This module provides the error taxonomy shared by the proxy client and the
//! directory backends, including HTTP error mapping and a structured,
//! serializable error response.
//!
//! Per-device application failures reported by the proxy (`Success: false`)
//! are not errors. They are routed into a failure buffer and never surface
//! through this type.

use serde::Serialize;
use thiserror::Error;

/// Main error type for netcommander operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Caller-supplied XML request text does not parse
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The proxy rejected a request at its validate endpoint.
    ///
    /// Carries the raw response body verbatim.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A streamed record could not be decoded
    #[error("Malformed response{}: {message}", host_suffix(.host.as_deref()))]
    MalformedResponse {
        /// Host the offending record belongs to, when known
        host: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Proxy or directory service is unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// No credentials were configured before a proxy call
    #[error("No credentials configured")]
    MissingCredentials,

    /// No device directory was configured before a lookup
    #[error("No device directory configured")]
    NoDirectory,

    /// A device does not carry the requested fact
    #[error("Device {device} has no fact `{fact}`")]
    MissingFact {
        /// Device name
        device: String,
        /// Requested fact key
        fact: String,
    },

    /// Device directory backend failed
    #[error("Directory error: {backend}: {message}")]
    DirectoryError {
        /// Backend name that failed
        backend: String,
        /// Error message
        message: String,
    },
}

fn host_suffix(host: Option<&str>) -> String {
    host.map(|h| format!(" from {h}")).unwrap_or_default()
}

/// Specialized result type for netcommander operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Host the error relates to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Build a [`Error::MalformedResponse`] tied to a host.
    pub fn malformed_response(host: Option<&str>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            host: host.map(str::to_string),
            message: message.into(),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "MALFORMED_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::NoDirectory => "NO_DIRECTORY",
            Self::MissingFact { .. } => "MISSING_FACT",
            Self::DirectoryError { .. } => "DIRECTORY_ERROR",
        }
    }

    /// Returns true for connection, timeout and mid-stream I/O failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::HttpError(_) | Self::Timeout(_)
        )
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        let host = match &self {
            Self::MalformedResponse { host, .. } => host.clone(),
            _ => None,
        };
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
            host,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::MalformedResponse { .. } | Self::DirectoryError { .. }
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_response(None, err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::MalformedRequest("test".to_string()).error_code(),
            "MALFORMED_REQUEST"
        );
        assert_eq!(
            Error::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            Error::malformed_response(Some("r1"), "test").error_code(),
            "MALFORMED_RESPONSE"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(Error::MissingCredentials.error_code(), "MISSING_CREDENTIALS");
        assert_eq!(Error::NoDirectory.error_code(), "NO_DIRECTORY");
        assert_eq!(
            Error::MissingFact {
                device: "r1".to_string(),
                fact: "model".to_string()
            }
            .error_code(),
            "MISSING_FACT"
        );
        assert_eq!(
            Error::DirectoryError {
                backend: "optopus".to_string(),
                message: "msg".to_string()
            }
            .error_code(),
            "DIRECTORY_ERROR"
        );
    }

    #[test]
    fn test_validation_error_keeps_body_verbatim() {
        let err = Error::ValidationError("bad xpath".to_string());
        assert!(matches!(&err, Error::ValidationError(body) if body == "bad xpath"));
        assert_eq!(err.to_string(), "Validation error: bad xpath");
    }

    #[test]
    fn test_malformed_response_display() {
        let err = Error::malformed_response(Some("r1"), "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "Malformed response from r1: unexpected end of input"
        );

        let err = Error::malformed_response(None, "bad json");
        assert_eq!(err.to_string(), "Malformed response: bad json");
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::Timeout("t".to_string()).is_transport());
        assert!(Error::HttpError("h".to_string()).is_transport());
        assert!(Error::ServiceUnavailable("s".to_string()).is_transport());
        assert!(!Error::ValidationError("v".to_string()).is_transport());
        assert!(!Error::malformed_response(None, "m").is_transport());
    }

    #[test]
    fn test_into_error_response() {
        let response = Error::malformed_response(Some("r2"), "oops").into_error_response();
        assert_eq!(response.error.code, "MALFORMED_RESPONSE");
        assert_eq!(response.host.as_deref(), Some("r2"));

        let response = Error::NoDirectory.into_error_response();
        assert!(response.host.is_none());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("host"));
    }

    #[test]
    fn test_should_log() {
        assert!(Error::ConfigError("test".to_string()).should_log());
        assert!(Error::malformed_response(None, "x").should_log());
        assert!(!Error::ValidationError("test".to_string()).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::MalformedResponse { host: None, .. }));
    }
}
