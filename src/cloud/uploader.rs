use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;

use crate::cloud::client::create_http_client;
use crate::cloud::error::UploadError;
use crate::cloud::multipart::MultipartEnvelope;
use crate::cloud::progress::{LogReporter, ProgressReporter};
use crate::cloud::sniff;
use crate::cloud::streaming::{PumpReport, StreamPump};
use crate::config::{ProducerPolicy, UploaderConfig};
use crate::constants::{FILE_FIELD_NAME, MIN_CHUNK_SIZE};
use crate::models::{DataEnvelope, FileMetadata};

/// How the file travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Multipart form PUT to the API, authenticated with a bearer token
    Metadata,
    /// Raw PUT of the file bytes to a presigned storage URL
    Presigned,
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Metadata => write!(f, "metadata"),
            UploadMode::Presigned => write!(f, "presigned"),
        }
    }
}

/// Where a transfer goes.
#[derive(Clone)]
pub struct UploadTarget {
    url: String,
    bearer: Option<String>,
    mode: UploadMode,
}

impl UploadTarget {
    pub fn metadata(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { url: url.into(), bearer: Some(token.into()), mode: UploadMode::Metadata }
    }

    pub fn presigned(url: impl Into<String>) -> Self {
        Self { url: url.into(), bearer: None, mode: UploadMode::Presigned }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }

    fn validate(&self) -> Result<(), UploadError> {
        if self.url.trim().is_empty() {
            return Err(UploadError::construction("upload URL is empty"));
        }
        match (self.mode, self.bearer.as_deref()) {
            (UploadMode::Metadata, Some(token)) if !token.trim().is_empty() => Ok(()),
            (UploadMode::Metadata, _) => Err(UploadError::construction("metadata upload requires a bearer token")),
            (UploadMode::Presigned, None) => Ok(()),
            (UploadMode::Presigned, Some(_)) => {
                Err(UploadError::construction("presigned upload must not carry a bearer token"))
            }
        }
    }
}

// Presigned URLs carry their signature in the query string
impl fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTarget")
            .field("url", &redact_query(&self.url))
            .field("bearer", &self.bearer.as_ref().map(|_| "<REDACTED_TOKEN>"))
            .field("mode", &self.mode)
            .finish()
    }
}

/// The local side of a transfer: an open file and how to read it.
#[derive(Debug)]
pub struct TransferDescriptor {
    file: File,
    size: u64,
    chunk_size: usize,
    file_name: String,
    original_path: Option<String>,
}

impl TransferDescriptor {
    /// Open `path` and record its size.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, UploadError> {
        let file = File::open(path).map_err(|e| {
            UploadError::construction_io(format!("failed to open file {}", path.display()), e)
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| FILE_FIELD_NAME.to_string());

        Self::from_file(file, file_name, chunk_size)
    }

    /// Wrap an already open file.
    pub fn from_file(file: File, file_name: impl Into<String>, chunk_size: usize) -> Result<Self, UploadError> {
        let metadata = file
            .metadata()
            .map_err(|e| UploadError::construction_io("failed to stat file", e))?;
        if !metadata.is_file() {
            return Err(UploadError::construction("upload source is not a regular file"));
        }

        Ok(Self {
            file,
            size: metadata.len(),
            chunk_size,
            file_name: file_name.into(),
            original_path: None,
        })
    }

    pub fn with_original_path(mut self, original_path: impl Into<String>) -> Self {
        self.original_path = Some(original_path.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn original_path(&self) -> Option<&str> {
        self.original_path.as_deref()
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Metadata mode: the record the API created for the file
    Metadata(FileMetadata),
    /// Presigned mode: the storage accepted the bytes
    Stored,
}

/// Lifecycle of one transfer. States are never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    FramingComputed,
    Streaming,
    Completed,
    Failed,
}

impl TransferState {
    pub fn can_advance_to(self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Idle, FramingComputed)
                | (Idle, Failed)
                | (FramingComputed, Streaming)
                | (FramingComputed, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }
}

struct Transfer {
    name: String,
    state: TransferState,
}

impl Transfer {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), state: TransferState::Idle }
    }

    fn advance(&mut self, next: TransferState) -> Result<(), UploadError> {
        if !self.state.can_advance_to(next) {
            return Err(UploadError::construction(format!(
                "illegal transfer transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!("Transfer of {}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: UploadError) -> UploadError {
        if !self.state.is_terminal() {
            debug!("Transfer of {}: {:?} -> Failed", self.name, self.state);
            self.state = TransferState::Failed;
        }
        warn!("Upload of {} failed: {}", self.name, err);
        err
    }
}

/// Body framing and length, fixed before the request starts.
struct Framing {
    content_type: String,
    header: Bytes,
    trailer: Bytes,
    total: u64,
}

/// Runs single-attempt streaming uploads.
///
/// Each call to [`Uploader::upload`] moves one file: the exact body length is
/// computed first, then a producer task streams the file through a bounded
/// pipe while the request is in flight.
pub struct Uploader {
    client: Client,
    policy: ProducerPolicy,
    reporter: Arc<dyn ProgressReporter>,
}

impl Uploader {
    pub fn new(config: &UploaderConfig) -> anyhow::Result<Self> {
        Ok(Self::with_client(create_http_client()?, config))
    }

    pub fn with_client(client: Client, config: &UploaderConfig) -> Self {
        Self {
            client,
            policy: config.producer_policy,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn policy(&self) -> ProducerPolicy {
        self.policy
    }

    /// Upload one file to `target`.
    ///
    /// `fields` are extra text form fields and are only valid in metadata mode.
    pub async fn upload(
        &self,
        descriptor: TransferDescriptor,
        target: &UploadTarget,
        fields: &BTreeMap<String, String>,
    ) -> Result<UploadOutcome, UploadError> {
        let mut transfer = Transfer::new(descriptor.original_path().unwrap_or(&descriptor.file_name));
        let start = Instant::now();

        let (file, size, chunk_size, framing) = match Self::prepare(descriptor, target, fields) {
            Ok(prepared) => prepared,
            Err(e) => return Err(transfer.fail(e)),
        };
        transfer.advance(TransferState::FramingComputed)?;

        let pump = StreamPump::new(tokio::fs::File::from_std(file), size, chunk_size, Arc::clone(&self.reporter))
            .with_framing(framing.header, framing.trailer)
            .with_policy(self.policy);

        match pump.total_len() {
            Ok(n) if n == framing.total => {}
            Ok(n) => {
                return Err(transfer.fail(UploadError::construction(format!(
                    "body length {} does not match declared content length {}",
                    n, framing.total
                ))))
            }
            Err(e) => return Err(transfer.fail(e)),
        }

        info!(
            "Uploading {} ({} bytes, {} mode) to {}",
            transfer.name,
            size,
            target.mode,
            redact_query(&target.url)
        );

        let (body, producer) = pump.spawn();
        transfer.advance(TransferState::Streaming)?;

        let mut request = self
            .client
            .put(&target.url)
            .header(CONTENT_TYPE, framing.content_type)
            .header(CONTENT_LENGTH, framing.total)
            .header(ACCEPT, "application/json")
            .body(body);
        if let (UploadMode::Metadata, Some(token)) = (target.mode, target.bearer.as_deref()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await;

        let result = match response {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await;
                // The response is complete; a producer still parked on the pipe is abandoned
                if !producer.is_finished() {
                    debug!("Server answered {} before the body was sent, stopping the producer", status);
                    producer.abort();
                }
                let report = Self::finish_producer(producer).await;
                Self::interpret(target.mode, status, text, report, framing.total)
            }
            Err(e) => match Self::finish_producer(producer).await {
                Err(producer_err) => Err(producer_err),
                Ok(_) => Err(UploadError::transport("failed to send request", e)),
            },
        };

        match result {
            Ok(outcome) => {
                transfer.advance(TransferState::Completed)?;
                info!("Uploaded {} ({} bytes) in {:?}", transfer.name, size, start.elapsed());
                Ok(outcome)
            }
            Err(e) => Err(transfer.fail(e)),
        }
    }

    fn prepare(
        descriptor: TransferDescriptor,
        target: &UploadTarget,
        fields: &BTreeMap<String, String>,
    ) -> Result<(File, u64, usize, Framing), UploadError> {
        target.validate()?;
        if descriptor.chunk_size < MIN_CHUNK_SIZE {
            return Err(UploadError::construction(format!(
                "chunk size {} is below the minimum {}",
                descriptor.chunk_size, MIN_CHUNK_SIZE
            )));
        }

        let TransferDescriptor { mut file, size, chunk_size, file_name, .. } = descriptor;

        let framing = match target.mode {
            UploadMode::Metadata => {
                let envelope = MultipartEnvelope::new(fields, FILE_FIELD_NAME, &file_name)?;
                let total = envelope.content_length(size)?;
                let content_type = envelope.content_type().to_string();
                let (header, trailer) = envelope.into_parts();
                Framing { content_type, header, trailer, total }
            }
            UploadMode::Presigned => {
                if !fields.is_empty() {
                    return Err(UploadError::construction("presigned uploads cannot carry form fields"));
                }
                Framing {
                    content_type: sniff::sniff(&mut file),
                    header: Bytes::new(),
                    trailer: Bytes::new(),
                    total: size,
                }
            }
        };

        debug!("Framing for {}: {} ({} bytes total)", file_name, framing.content_type, framing.total);
        Ok((file, size, chunk_size, framing))
    }

    /// Wait for the producer task. `None` means it was aborted before it finished.
    async fn finish_producer(
        producer: tokio::task::JoinHandle<Result<PumpReport, UploadError>>,
    ) -> Result<Option<PumpReport>, UploadError> {
        match producer.await {
            Ok(report) => report.map(Some),
            Err(e) if e.is_cancelled() => Ok(None),
            Err(e) => Err(UploadError::producer(format!("producer task failed: {}", e), None)),
        }
    }

    fn interpret(
        mode: UploadMode,
        status: u16,
        text: Result<String, reqwest::Error>,
        report: Result<Option<PumpReport>, UploadError>,
        total: u64,
    ) -> Result<UploadOutcome, UploadError> {
        let report = report?;
        let body = text.map_err(|e| UploadError::transport("failed to read the response body", e))?;

        if status >= 400 {
            return Err(UploadError::Server { status, body });
        }

        let sent = report.map_or(0, |r| r.bytes_sent);
        if sent != total {
            warn!("Server answered {} after {} of {} body bytes", status, sent, total);
        }

        match mode {
            UploadMode::Metadata => Ok(UploadOutcome::Metadata(decode_metadata(&body)?)),
            UploadMode::Presigned => Ok(UploadOutcome::Stored),
        }
    }
}

/// Decode a file record, with or without the `{"data": ...}` wrapper.
///
/// A bare record must carry its `type`; every field is optional, so without
/// that check any JSON object would pass as a record.
pub fn decode_metadata(body: &str) -> Result<FileMetadata, UploadError> {
    if let Ok(envelope) = serde_json::from_str::<DataEnvelope<FileMetadata>>(body) {
        return Ok(envelope.data);
    }
    let record = serde_json::from_str::<FileMetadata>(body)?;
    if record.file_type.is_empty() {
        return Err(UploadError::Decode(serde::de::Error::custom(
            "response is neither a data envelope nor a file record",
        )));
    }
    Ok(record)
}

/// Drop the query string from a URL before it is logged.
pub fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
