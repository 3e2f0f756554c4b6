//! Device directory capability.
//!
//! The proxy client never knows where devices come from. Any inventory or
//! search service can be plugged in by implementing [`DeviceDirectory`].

use serde_json::Value;

use crate::device::{Device, DeviceSet};
use crate::error::Result;

/// Resolves queries into device sets.
///
/// The query grammar belongs to the implementation; callers only rely on
/// getting a [`DeviceSet`] back.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Find devices matching an implementation-defined query.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or answers with
    /// something it cannot decode.
    async fn search(&self, query: &str) -> Result<DeviceSet>;

    /// Return every device the directory knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn all_devices(&self) -> Result<DeviceSet>;
}

/// In-memory directory over a fixed device set.
///
/// Queries are whitespace-separated terms that must all match. A `key:value`
/// term matches a device whose fact `key` renders as `value`; any other term
/// matches when it is a substring of the device name.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    devices: DeviceSet,
}

impl StaticDirectory {
    /// Create a directory over the given devices.
    #[must_use]
    pub const fn new(devices: DeviceSet) -> Self {
        Self { devices }
    }

    fn matches(device: &Device, query: &str) -> bool {
        query.split_whitespace().all(|term| match term.split_once(':') {
            Some((key, expected)) => device.get(key).is_some_and(|value| match value {
                Value::String(s) => s == expected,
                other => other.to_string() == expected,
            }),
            None => device.hostname.contains(term),
        })
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for StaticDirectory {
    async fn search(&self, query: &str) -> Result<DeviceSet> {
        Ok(self
            .devices
            .iter()
            .filter(|device| Self::matches(device, query))
            .cloned()
            .collect())
    }

    async fn all_devices(&self) -> Result<DeviceSet> {
        Ok(self.devices.clone())
    }
}
