//! # netcommander-core
//!
//! Core types for sending one structured command to many network devices
//! through a NETCONF proxy.
//!
//! This crate holds everything the protocol client and directory backends
//! share: the error type, configuration, device data model, the directory
//! capability and the namespace-erasing XML tree.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and HTTP error conversion
//! - [`config`] - Proxy endpoint configuration
//! - [`client`] - HTTP transport defaults shared by all clients
//! - [`device`] - Credentials, devices and device sets
//! - [`directory`] - The pluggable device directory capability
//! - [`xml`] - XML element tree, parsing and namespace normalization

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod device;
pub mod directory;
pub mod error;
pub mod xml;

// Re-export commonly used types
pub use device::{Credentials, Device, DeviceSet};
pub use directory::DeviceDirectory;
pub use error::{Error, Result};
pub use xml::{Element, Node, XmlNormalizer};
