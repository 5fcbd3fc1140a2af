//! Payload offloading.
//!
//! # Data Flow
//! ```text
//! guard decides a payload must leave the response
//!     → safe_store (fail-open wrapper, logs + metrics)
//!     → PayloadOffloader::store (memory.rs | http.rs)
//!     → OffloadResult { url, key } handed back to the guard
//! ```
//!
//! # Design Decisions
//! - Storage failures never propagate past `safe_store`
//! - Object keys follow `key.rs` so producers in other stacks stay compatible
//! - No retries; backpressure belongs to the storage backend

pub mod http;
pub mod key;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::observability::{metrics, Logger};

pub use self::http::HttpOffloader;
pub use key::{object_key, object_key_now};
pub use memory::MemoryOffloader;

/// Characters of the body kept in the debug preview of a failed write.
const BODY_PREVIEW_CHARS: usize = 250;

/// One payload to store.
#[derive(Debug, Clone, Copy)]
pub struct OffloadRequest<'a> {
    pub bucket: &'a str,
    pub group_id: &'a str,
    pub request_id: Option<&'a str>,
    pub content: &'a str,
    pub content_type: &'a str,
}

/// Outcome of a write. A missing `url` means the write failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffloadResult {
    pub url: Option<String>,
    pub key: Option<String>,
}

/// Errors that can occur while storing a payload.
#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage rejected the write with status {0}")]
    Status(u16),

    #[error("storage not configured: {0}")]
    NotConfigured(String),

    #[error("storage error: {0}")]
    Other(String),
}

/// Capability writing a payload to object storage and returning a reference.
#[async_trait]
pub trait PayloadOffloader: Send + Sync {
    async fn store(&self, request: OffloadRequest<'_>) -> Result<OffloadResult, OffloadError>;
}

/// Store a payload, turning any failure into an empty result plus an ERROR log.
pub async fn safe_store(
    offloader: &dyn PayloadOffloader,
    logger: &dyn Logger,
    request: OffloadRequest<'_>,
) -> OffloadResult {
    match offloader.store(request).await {
        Ok(result) => {
            metrics::record_offload(if result.url.is_some() { "stored" } else { "empty" });
            result
        }
        Err(error) => {
            metrics::record_offload("failed");
            let mut fields = json!({
                "error": error.to_string(),
                "request_id": request.request_id,
                "group_id": request.group_id,
            });
            if logger.debug_enabled() {
                fields["response_body"] = json!(body_preview(request.content));
            }
            logger.error("Failed to write large response to object storage", &fields);
            OffloadResult::default()
        }
    }
}

fn body_preview(content: &str) -> String {
    let preview: String = content.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{preview} <redacted>")
}
