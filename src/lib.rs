//! # rust-uploader
//!
//! Streaming upload of build artifacts to a remote artifact API.
//!
//! ## Overview
//!
//! rust-uploader packages a game-engine plugin and ships it to the artifact API.
//! Files are streamed from disk in fixed-size chunks while the HTTP request is in
//! flight, so memory use stays bounded no matter how large the package is.
//!
//! ## Features
//!
//! - **Streaming uploads**: one producer task feeds the request body through a bounded pipe
//! - **Exact framing**: multipart headers are computed up front so `Content-Length` is always known
//! - **Two upload modes**: multipart to the API, or raw bytes to a presigned storage URL
//! - **Content sniffing**: presigned uploads carry a MIME type detected from the file itself
//! - **Progress reporting**: monotonic `(sent, total)` callbacks, logged by default
//! - **Packaging**: zip packing and unpacking of plugin directories with mode bits preserved
//!
//! ## Usage
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use rust_uploader::cloud::api::ApiClient;
//! use rust_uploader::cloud::uploader::{TransferDescriptor, Uploader};
//! use rust_uploader::config::{ProducerPolicy, UploaderConfig};
//! use uuid::Uuid;
//!
//! # async fn example(entity: Uuid) -> anyhow::Result<()> {
//! let config = UploaderConfig::new("https://api.example.com", "token", None, ProducerPolicy::FailFast)?;
//! let api = ApiClient::new(&config)?;
//! let uploader = Uploader::new(&config)?;
//!
//! let target = api.metadata_target(entity, "uplugin", "application/json", "Plugin.uplugin")?;
//! let descriptor = TransferDescriptor::open(Path::new("Plugin.uplugin"), config.chunk_size)?;
//! let outcome = uploader.upload(descriptor, &target, &BTreeMap::new()).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Uploader configuration and chunk size policy
//! - [`constants`]: Application-wide constants
//! - [`models`]: API data models
//! - [`cloud`]: Streaming upload engine and API client
//! - [`utils`]: Project discovery and zip packaging
//! - [`tasks`]: The package tasks run by the binary

/// Command-line interface definitions and argument parsing
pub mod cli;

/// API data models
pub mod models;

/// Project discovery and zip packaging
pub mod utils;

/// Streaming upload engine and API client
pub mod cloud;

/// Uploader configuration
pub mod config;

/// Application constants
pub mod constants;

/// Package tasks
pub mod tasks;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
