//! Streaming batch-RPC client for a NETCONF proxy.
//!
//! One HTTP call addresses every device in a [`DeviceSet`]; the proxy fans
//! out, and streams back one JSON record per device as each finishes. This
//! crate builds that call, decodes the stream lazily and separates successes
//! from per-device failures without aborting the batch.
//!
//! [`DeviceSet`]: netcommander_core::DeviceSet

#![deny(missing_docs)]

pub mod client;
pub mod envelope;
pub mod models;
pub mod request;
pub mod stream;

pub use client::{ProxyClient, ProxyClientBuilder};
pub use envelope::RpcEnvelope;
pub use models::{DeviceReply, RawResponse, ResultRecord};
pub use request::{ProxyOperation, ProxyRequest, ProxyRequestBuilder, RequestBody};
pub use stream::RecordStream;

/// Convenient result alias matching the shared netcommander error type.
pub type Result<T> = netcommander_core::Result<T>;
