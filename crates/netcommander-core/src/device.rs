//! Credentials, devices and device sets.
//!
//! A [`Device`] is a named record carrying opaque facts. A [`DeviceSet`] keeps
//! devices unique by name in insertion order; inserting a device whose name is
//! already present replaces it in place.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Default port the proxy uses to reach devices
pub const DEFAULT_DEVICE_PORT: u16 = 22;

/// Login credentials the proxy uses against every targeted device.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
    port: u16,
}

impl Credentials {
    /// Create credentials using the default port (22).
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_port(username, password, DEFAULT_DEVICE_PORT)
    }

    /// Create credentials with an explicit device port.
    pub fn with_port(username: impl Into<String>, password: impl Into<String>, port: u16) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            port,
        }
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plain-text password, only exposed when building a request payload.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Device connection port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// A named network device with an open-ended set of facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name
    pub hostname: String,
    /// Facts reported by the directory, never interpreted here
    #[serde(default)]
    pub facts: Map<String, Value>,
}

impl Device {
    /// Create a device with no facts.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            facts: Map::new(),
        }
    }

    /// Create a device with the given facts.
    pub fn with_facts(hostname: impl Into<String>, facts: Map<String, Value>) -> Self {
        Self {
            hostname: hostname.into(),
            facts,
        }
    }

    /// Add or replace a single fact.
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.hostname
    }

    /// Look up a fact by key.
    #[must_use]
    pub fn get(&self, fact: &str) -> Option<&Value> {
        self.facts.get(fact)
    }

    /// All facts.
    #[must_use]
    pub const fn facts(&self) -> &Map<String, Value> {
        &self.facts
    }
}

/// Borrowed wire form of one device: `{"hostname": .., "facts": {..}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeRef<'a> {
    /// Device name
    pub hostname: &'a str,
    /// Device facts
    pub facts: &'a Map<String, Value>,
}

/// Ordered collection of devices, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Insert a device.
    ///
    /// If a device with the same name exists it is replaced in place and the
    /// previous value is returned.
    pub fn insert(&mut self, device: Device) -> Option<Device> {
        match self.position(&device.hostname) {
            Some(idx) => Some(std::mem::replace(&mut self.devices[idx], device)),
            None => {
                self.devices.push(device);
                None
            }
        }
    }

    /// Remove a device by name.
    pub fn remove(&mut self, name: &str) -> Option<Device> {
        self.position(name).map(|idx| self.devices.remove(idx))
    }

    /// Look up a device by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.position(name).map(|idx| &self.devices[idx])
    }

    /// Returns true if a device with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if the set holds no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate devices in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }

    /// Device names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.devices.iter().map(Device::name).collect()
    }

    /// Collect one fact across every device, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFact`] for the first device lacking the fact.
    pub fn fact_list(&self, fact: &str) -> Result<Vec<&Value>> {
        self.devices
            .iter()
            .map(|device| {
                device.get(fact).ok_or_else(|| Error::MissingFact {
                    device: device.hostname.clone(),
                    fact: fact.to_string(),
                })
            })
            .collect()
    }

    /// The `nodes` wire form sent to the proxy.
    #[must_use]
    pub fn as_nodes(&self) -> Vec<NodeRef<'_>> {
        self.devices
            .iter()
            .map(|device| NodeRef {
                hostname: &device.hostname,
                facts: &device.facts,
            })
            .collect()
    }

    /// Serialize the set as a JSON array of nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if a fact value cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.as_nodes())
            .map_err(|e| Error::ConfigError(format!("Failed to serialize device set: {e}")))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.hostname == name)
    }
}

impl Serialize for DeviceSet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_nodes().serialize(serializer)
    }
}

impl FromIterator<Device> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Device> for DeviceSet {
    fn extend<I: IntoIterator<Item = Device>>(&mut self, iter: I) {
        for device in iter {
            self.insert(device);
        }
    }
}

impl<'a> IntoIterator for &'a DeviceSet {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl IntoIterator for DeviceSet {
    type Item = Device;
    type IntoIter = std::vec::IntoIter<Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
