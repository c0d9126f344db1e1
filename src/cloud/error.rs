use std::io;

use thiserror::Error;

/// Failure modes of a single transfer.
///
/// Every variant is terminal: a transfer is attempted exactly once and there
/// is no partial-success state.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request could not be built. Raised before any byte reaches the network.
    #[error("failed to prepare upload: {message}")]
    Construction {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Connection or body write failure reported by the HTTP transport.
    #[error("failed to send request: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status of 400 or above.
    #[error("failed to upload a file, status code: {status}, content: {body}")]
    Server { status: u16, body: String },

    /// The producer could not read the file while streaming it.
    #[error("failed to stream file bytes: {message}")]
    Producer {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// A successful response carried a body that could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UploadError {
    pub fn construction(message: impl Into<String>) -> Self {
        UploadError::Construction { message: message.into(), source: None }
    }

    pub fn construction_io(message: impl Into<String>, source: io::Error) -> Self {
        UploadError::Construction { message: message.into(), source: Some(source) }
    }

    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        UploadError::Transport { context: context.into(), source }
    }

    pub fn producer(message: impl Into<String>, source: Option<io::Error>) -> Self {
        UploadError::Producer { message: message.into(), source }
    }

    /// HTTP status of a server rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the failure happened before the network was touched.
    pub fn is_construction(&self) -> bool {
        matches!(self, UploadError::Construction { .. })
    }
}
