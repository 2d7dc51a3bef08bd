//! Update server client.
//!
//! Plain HTTP GETs through `reqwest`. The version endpoint returns a short decimal body,
//! the firmware endpoint the raw image.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tokio::time::timeout;

use super::UpdateError;
use super::version::{MAX_VERSION_BODY, parse_version};

/// Source of firmware image bytes.
#[async_trait]
pub trait FirmwareBody: Send {
    /// Next piece of the image, `None` once the body is complete.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, UpdateError>;
}

#[async_trait]
impl FirmwareBody for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, UpdateError> {
        match self.chunk().await {
            Ok(chunk) => Ok(chunk.map(|bytes| bytes.to_vec())),
            Err(e) => Err(UpdateError::TransferInterrupted(e.to_string())),
        }
    }
}

/// Firmware body as it arrives from the server.
pub struct FirmwareImage {
    pub body: Box<dyn FirmwareBody>,
    /// Size announced by the server, if any.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirmwareImage").field("content_length", &self.content_length).finish()
    }
}

#[async_trait]
pub trait UpdateServer: Send + Sync {
    /// Latest firmware version published for `revision`.
    async fn fetch_version(&self, revision: u32) -> Result<i32, UpdateError>;

    /// Open the firmware image for `revision`.
    async fn fetch_firmware(&self, revision: u32) -> Result<FirmwareImage, UpdateError>;
}

#[derive(Debug, Clone)]
pub struct HttpUpdateClient {
    base_url: String,
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpUpdateClient {
    pub fn new(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()
            .map_err(UpdateError::Connection)?;
        Ok(Self { base_url: format!("http://{}:{}", host, port), client, read_timeout })
    }

    pub fn version_path(revision: u32) -> String {
        format!("/card/{}/version", revision)
    }

    pub fn firmware_path(revision: u32) -> String {
        format!("/card/{}/firmware", revision)
    }

    /// Send a GET for `path` and wait for a successful status.
    async fn get(&self, path: &str) -> Result<reqwest::Response, UpdateError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let request = self.client.get(&url).header(ACCEPT, "text/plain,application/octet-stream").send();
        let response = timeout(self.read_timeout, request)
            .await
            .map_err(|_| UpdateError::MalformedResponse(format!("no response headers for {}", path)))?
            .map_err(request_error)?;
        response
            .error_for_status()
            .map_err(|e| UpdateError::MalformedResponse(e.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> UpdateError {
    if e.is_connect() || e.is_builder() {
        UpdateError::Connection(e)
    } else {
        UpdateError::MalformedResponse(e.to_string())
    }
}

#[async_trait]
impl UpdateServer for HttpUpdateClient {
    async fn fetch_version(&self, revision: u32) -> Result<i32, UpdateError> {
        let mut response = self.get(&Self::version_path(revision)).await?;
        let mut body = Vec::with_capacity(MAX_VERSION_BODY);
        let read = async {
            while body.len() < MAX_VERSION_BODY {
                match response.next_chunk().await? {
                    Some(chunk) => body.extend_from_slice(&chunk),
                    None => break,
                }
            }
            Ok::<_, UpdateError>(())
        };
        timeout(self.read_timeout, read)
            .await
            .map_err(|_| UpdateError::TransferInterrupted("version body timed out".to_string()))??;
        body.truncate(MAX_VERSION_BODY);
        parse_version(&body).ok_or_else(|| {
            UpdateError::MalformedResponse(format!("version body '{}'", String::from_utf8_lossy(&body)))
        })
    }

    async fn fetch_firmware(&self, revision: u32) -> Result<FirmwareImage, UpdateError> {
        let response = self.get(&Self::firmware_path(revision)).await?;
        let content_length = response.content_length();
        Ok(FirmwareImage { body: Box::new(response), content_length })
    }
}
