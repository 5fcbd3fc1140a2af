//! Object storage over plain HTTP.
//!
//! Writes payloads with a path-style PUT (`{endpoint}/{bucket}/{key}`) to an
//! S3-compatible endpoint, e.g. a local emulator or a presigning gateway,
//! and hands out `{public_base_url}/{bucket}/{key}` as the reference.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::offload::key::object_key_now;
use crate::offload::{OffloadError, OffloadRequest, OffloadResult, PayloadOffloader};
use crate::protocol::STORAGE_TIMEOUT_SECS;

pub struct HttpOffloader {
    client: Client,
    endpoint: String,
    public_base_url: String,
}

impl HttpOffloader {
    /// Create an offloader writing to `endpoint` with the default 60s timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, OffloadError> {
        Self::with_timeout(endpoint, Duration::from_secs(STORAGE_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OffloadError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(OffloadError::NotConfigured("empty endpoint".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            public_base_url: endpoint.clone(),
            endpoint,
        })
    }

    /// Hand out references below a different base URL than the write endpoint.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PayloadOffloader for HttpOffloader {
    async fn store(&self, request: OffloadRequest<'_>) -> Result<OffloadResult, OffloadError> {
        let key = object_key_now(request.group_id, request.request_id);
        let path = format!("{}/{}", request.bucket, key);

        let content_type = if request.content_type.is_empty() {
            "text/plain"
        } else {
            request.content_type
        };

        let response = self
            .client
            .put(format!("{}/{}", self.endpoint, path))
            .header(CONTENT_TYPE, content_type)
            .header("x-amz-acl", "private")
            .body(request.content.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OffloadError::Status(status.as_u16()));
        }

        tracing::debug!(path = %path, status = %status, "Stored payload over HTTP");

        Ok(OffloadResult {
            url: Some(format!("{}/{}", self.public_base_url, path)),
            key: Some(key),
        })
    }
}
