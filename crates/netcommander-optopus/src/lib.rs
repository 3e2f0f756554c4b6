//! Optopus inventory backend for device lookups.
//!
//! This crate provides [`OptopusDirectory`], a [`DeviceDirectory`] that
//! resolves queries against an Optopus inventory service, so that a proxy
//! client can be pointed at devices by search string instead of by name.
//!
//! [`DeviceDirectory`]: netcommander_core::DeviceDirectory

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod models;

pub use client::{OptopusDirectory, OptopusDirectoryBuilder};
pub use config::OptopusConfig;
pub use models::{ActiveNode, NetworkNode, SearchResults};

/// Convenient result alias matching the shared netcommander error type.
pub type Result<T> = netcommander_core::Result<T>;
