use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Create the HTTP client shared by the API client and the uploader.
///
/// No request timeout is configured: an upload of any size is allowed to take
/// as long as the connection keeps moving.
pub fn create_http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")?;

    debug!("Created HTTP client ({})", USER_AGENT);
    Ok(client)
}
