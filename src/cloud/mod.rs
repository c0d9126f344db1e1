//! Streaming uploads to the artifact API and presigned storage.
//!
//! This module moves files from local disk to the remote API without ever
//! holding a whole file in memory. The exact request length is computed before
//! the first byte is sent, then a single producer task streams the file through
//! a bounded pipe while the HTTP request is in flight.
//!
//! ## Upload Modes
//!
//! - **Metadata**: multipart/form-data `PUT` to the API with a bearer token;
//!   the response is the file record the API created
//! - **Presigned**: raw `PUT` of the file bytes to a presigned storage URL,
//!   with the content type sniffed from the file itself
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   framing    ┌─────────────────┐
//! │ MultipartEnvelope│─────────────▶│                 │
//! └──────────────────┘              │    Uploader     │
//! ┌──────────────────┐   mime type  │                 │
//! │      sniff       │─────────────▶│                 │
//! └──────────────────┘              └───┬─────────┬───┘
//!                                spawn  │         │ PUT (Content-Length fixed)
//!                          ┌────────────▼───┐   ┌─▼──────────────┐
//!                          │   StreamPump   │──▶│ reqwest::Body  │
//!                          │ (file → pipe)  │   │ (pipe → socket)│
//!                          └───────┬────────┘   └────────────────┘
//!                                  │ (sent, total)
//!                          ┌───────▼────────┐
//!                          │ProgressReporter│
//!                          └────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use rust_uploader::cloud::uploader::{TransferDescriptor, Uploader, UploadTarget};
//! use rust_uploader::config::{ProducerPolicy, UploaderConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UploaderConfig::new("https://api.example.com", "token", None, ProducerPolicy::FailFast)?;
//! let uploader = Uploader::new(&config)?;
//!
//! let descriptor = TransferDescriptor::open(Path::new("/tmp/Plugin.zip"), config.chunk_size)?;
//! let target = UploadTarget::presigned("https://storage.example.com/bucket/key?signature=abc");
//! uploader.upload(descriptor, &target, &BTreeMap::new()).await?;
//! # Ok(())
//! # }
//! ```

/// REST calls for upload negotiation and job creation
pub mod api;

/// HTTP client construction
pub mod client;

/// Upload error taxonomy
pub mod error;

/// Multipart framing with exact length accounting
pub mod multipart;

/// Progress sinks and byte counters
pub mod progress;

/// Content type detection from a file prefix
pub mod sniff;

/// Producer side of the request body pipe
pub mod streaming;

/// Transfer orchestration
pub mod uploader;
