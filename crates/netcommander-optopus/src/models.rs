//! Optopus wire models.

use netcommander_core::{Device, DeviceSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object type Optopus uses for network devices.
pub const NETWORK_NODE_TYPE: &str = "network_node";

/// Query parameters supported by Optopus's `/api/search` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Free-form search string.
    pub string: String,
    /// Object types to restrict results to.
    pub types: Vec<String>,
}

impl SearchParams {
    /// Search for network nodes matching `query`.
    ///
    /// Inactive nodes are excluded unless the query already says something
    /// about `active`.
    #[must_use]
    pub fn network_nodes(query: &str) -> Self {
        let string = if query.contains("active") {
            query.to_string()
        } else {
            format!("{query} active:true")
        };
        Self {
            string,
            types: vec![NETWORK_NODE_TYPE.to_string()],
        }
    }

    /// Convert the parameter struct into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("string", self.string.clone())];
        if !self.types.is_empty() {
            pairs.push(("types", self.types.join(",")));
        }
        pairs
    }
}

/// A network device as Optopus describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    /// Device hostname.
    pub hostname: String,
    /// Inventory facts (location, model, ...).
    #[serde(default)]
    pub facts: Map<String, Value>,
}

impl From<NetworkNode> for Device {
    fn from(node: NetworkNode) -> Self {
        Self::with_facts(node.hostname, node.facts)
    }
}

/// Body of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matching nodes.
    #[serde(default)]
    pub results: Vec<NetworkNode>,
}

impl SearchResults {
    /// Convert the matches into a device set.
    #[must_use]
    pub fn into_devices(self) -> DeviceSet {
        self.results.into_iter().map(Device::from).collect()
    }
}

/// Element of the `/api/network_nodes/active` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveNode {
    /// The wrapped node.
    pub network_node: NetworkNode,
}

impl From<ActiveNode> for Device {
    fn from(entry: ActiveNode) -> Self {
        entry.network_node.into()
    }
}
