use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Url};
use uuid::Uuid;

use crate::cloud::client::create_http_client;
use crate::cloud::error::UploadError;
use crate::cloud::uploader::UploadTarget;
use crate::config::UploaderConfig;
use crate::models::{DataEnvelope, FileMetadata, PackageJobRequest};

/// JSON REST client for upload negotiation and job creation.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &UploaderConfig) -> anyhow::Result<Self> {
        Ok(Self::with_client(create_http_client()?, config))
    }

    pub fn with_client(client: Client, config: &UploaderConfig) -> Self {
        Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    /// Target for a multipart upload straight to the API.
    ///
    /// The package descriptor is uploaded without an index so re-uploads of the
    /// same package do not collide on the server side.
    pub fn metadata_target(
        &self,
        entity_id: Uuid,
        file_type: &str,
        mime: &str,
        original_path: &str,
    ) -> Result<UploadTarget, UploadError> {
        require_entity(entity_id)?;
        let url = self.url(
            &format!("entities/{}/files/upload", entity_id),
            &[("type", file_type), ("mime", mime), ("original-path", original_path)],
        )?;
        Ok(UploadTarget::metadata(url.to_string(), self.token.clone()))
    }

    /// Ask the API for a presigned storage URL for a file of `size` bytes.
    pub async fn request_upload_url(
        &self,
        entity_id: Uuid,
        file_type: &str,
        mime: &str,
        size: u64,
        original_path: &str,
    ) -> Result<FileMetadata, UploadError> {
        require_entity(entity_id)?;
        let entity = entity_id.to_string();
        let size = size.to_string();
        let url = self.url(
            "files/upload",
            &[
                ("entityId", entity.as_str()),
                ("type", file_type),
                ("mime", mime),
                ("size", size.as_str()),
                ("original-path", original_path),
            ],
        )?;

        debug!("Requesting upload URL for entity {} ({} bytes)", entity_id, size);
        let body = self.send(self.client.get(url).header(CONTENT_TYPE, "application/json")).await?;
        let envelope: DataEnvelope<FileMetadata> = serde_json::from_str(&body)?;
        if envelope.data.url.is_empty() {
            return Err(UploadError::construction("API returned an empty upload URL"));
        }
        Ok(envelope.data)
    }

    /// Queue package processing for an entity.
    pub async fn create_package_job(&self, entity_id: Uuid) -> Result<(), UploadError> {
        require_entity(entity_id)?;
        let url = self.url("jobs/package", &[])?;

        debug!("Creating package job for entity {}", entity_id);
        self.send(self.client.post(url).json(&PackageJobRequest { entity_id })).await?;
        Ok(())
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, UploadError> {
        let raw = format!("{}/{}", self.base_url, path);
        let mut url = Url::parse(&raw)
            .map_err(|e| UploadError::construction(format!("invalid API url {}: {}", raw, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, UploadError> {
        let response = request
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| UploadError::transport("failed to send request", e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::transport("failed to read the response body", e))?;

        if status >= 400 {
            return Err(UploadError::Server { status, body });
        }
        Ok(body)
    }
}

fn require_entity(entity_id: Uuid) -> Result<(), UploadError> {
    if entity_id.is_nil() {
        return Err(UploadError::construction("invalid entity id"));
    }
    Ok(())
}
