//! Wire records exchanged with the proxy.

use netcommander_core::Element;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// One line of the streamed `netconf` response.
///
/// Failed records are kept in this raw form; on `Success: false` the
/// `Output` field usually holds an error message rather than XML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Device the record belongs to
    #[serde(rename = "Hostname")]
    pub hostname: String,
    /// Whether the proxy reached the device and ran the command
    #[serde(rename = "Success")]
    pub success: bool,
    /// Raw XML reply, or an error message for failed records
    #[serde(rename = "Output", default)]
    pub output: Option<String>,
    /// Separate error message, sent by some proxy versions
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    /// Best available explanation for a failed record.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.output.as_deref())
    }
}

/// A successful device reply with its payload normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReply {
    /// Device the reply came from
    pub hostname: String,
    /// Namespace-free XML payload
    pub output: Element,
}

/// Pass-through response from the `validate` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response body as text
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_success_record() {
        let record: ResultRecord =
            serde_json::from_str(r#"{"Hostname":"r1","Success":true,"Output":"<a/>"}"#).unwrap();
        assert_eq!(record.hostname, "r1");
        assert!(record.success);
        assert_eq!(record.output.as_deref(), Some("<a/>"));
        assert!(record.error.is_none());
    }

    #[test]
    fn deserialize_null_output() {
        let record: ResultRecord =
            serde_json::from_str(r#"{"Hostname":"r1","Success":false,"Output":null}"#).unwrap();
        assert!(record.output.is_none());
        assert!(record.failure_message().is_none());
    }

    #[test]
    fn serialize_failure_matches_wire_names() {
        let record = ResultRecord {
            hostname: "r2".to_string(),
            success: false,
            output: Some("auth failed".to_string()),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"Hostname": "r2", "Success": false, "Output": "auth failed"})
        );
        assert_eq!(record.failure_message(), Some("auth failed"));
    }

    #[test]
    fn failure_message_prefers_error_field() {
        let record: ResultRecord = serde_json::from_str(
            r#"{"Hostname":"r3","Success":false,"Output":"","Error":"timeout"}"#,
        )
        .unwrap();
        assert_eq!(record.failure_message(), Some("timeout"));
    }
}
