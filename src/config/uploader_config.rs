use std::fmt;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_CHUNK_SIZE;

/// What the uploader does when the producer fails to read the file mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProducerPolicy {
    /// Abort the request body and return the read error to the caller
    #[default]
    FailFast,
    /// Log the read error, close the body and let the server decide
    BestEffort,
}

impl fmt::Display for ProducerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerPolicy::FailFast => write!(f, "fail-fast"),
            ProducerPolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Settings shared by every transfer of one invocation.
///
/// Built once from the command line and handed to the API client and the
/// uploader; nothing here is global.
#[derive(Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// API base url, without a trailing slash
    pub api_url: String,
    /// Bearer token for API calls
    pub token: String,
    /// Bytes read from disk per chunk
    pub chunk_size: usize,
    #[serde(default)]
    pub producer_policy: ProducerPolicy,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            token: String::new(),
            chunk_size: MIN_CHUNK_SIZE,
            producer_policy: ProducerPolicy::default(),
        }
    }
}

// Keep the token out of debug logs
impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<REDACTED_TOKEN>")
            .field("chunk_size", &self.chunk_size)
            .field("producer_policy", &self.producer_policy)
            .finish()
    }
}

impl UploaderConfig {
    /// Build and validate a configuration.
    ///
    /// A missing or too small chunk size is raised to `MIN_CHUNK_SIZE`.
    pub fn new(
        api_url: &str,
        token: &str,
        chunk_size: Option<usize>,
        producer_policy: ProducerPolicy,
    ) -> Result<Self> {
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(anyhow!("API base url is required"));
        }
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(anyhow!("API base url must be http(s): {}", api_url));
        }
        if token.trim().is_empty() {
            return Err(anyhow!("API token is required"));
        }

        Ok(Self {
            api_url,
            token: token.trim().to_string(),
            chunk_size: effective_chunk_size(chunk_size),
            producer_policy,
        })
    }
}

/// Clamp a requested chunk size to the supported minimum.
pub fn effective_chunk_size(requested: Option<usize>) -> usize {
    match requested {
        Some(size) if size >= MIN_CHUNK_SIZE => size,
        Some(size) => {
            if size > 0 {
                warn!("Chunk size {} is below the minimum, using {}", size, MIN_CHUNK_SIZE);
            }
            MIN_CHUNK_SIZE
        }
        None => MIN_CHUNK_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_base_url() {
        let config = UploaderConfig::new("https://api.example.com/v2/", "tok", None, ProducerPolicy::FailFast).unwrap();
        assert_eq!(config.api_url, "https://api.example.com/v2");
        assert_eq!(config.chunk_size, MIN_CHUNK_SIZE);
    }

    #[test]
    fn test_new_rejects_missing_values() {
        assert!(UploaderConfig::new("", "tok", None, ProducerPolicy::FailFast).is_err());
        assert!(UploaderConfig::new("https://api", " ", None, ProducerPolicy::FailFast).is_err());
        assert!(UploaderConfig::new("ftp://api", "tok", None, ProducerPolicy::FailFast).is_err());
    }

    #[test]
    fn test_chunk_size_clamping() {
        assert_eq!(effective_chunk_size(None), MIN_CHUNK_SIZE);
        assert_eq!(effective_chunk_size(Some(0)), MIN_CHUNK_SIZE);
        assert_eq!(effective_chunk_size(Some(1024)), MIN_CHUNK_SIZE);
        assert_eq!(effective_chunk_size(Some(MIN_CHUNK_SIZE * 4)), MIN_CHUNK_SIZE * 4);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = UploaderConfig::new("https://api", "super-secret", None, ProducerPolicy::BestEffort).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<REDACTED_TOKEN>"));
    }

    #[test]
    fn test_policy_serde_and_display() {
        assert_eq!(ProducerPolicy::default(), ProducerPolicy::FailFast);
        assert_eq!(ProducerPolicy::BestEffort.to_string(), "best-effort");
        let json = serde_json::to_string(&ProducerPolicy::BestEffort).unwrap();
        assert_eq!(json, "\"best-effort\"");
    }
}
