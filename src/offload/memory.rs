//! In-process payload store.
//!
//! Objects live in a concurrent map keyed by `{bucket}/{key}` and expire
//! after the reference validity window. The server exposes them under
//! `/_payloads/{bucket}/{key}` so handed-out references are fetchable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::offload::key::object_key_now;
use crate::offload::{OffloadError, OffloadRequest, OffloadResult, PayloadOffloader};
use crate::protocol::SIGNED_URL_EXPIRY_SECS;

/// A stored payload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content: String,
    pub content_type: String,
    expires_at: Instant,
}

impl StoredObject {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Payload store backed by a `DashMap`.
#[derive(Clone)]
pub struct MemoryOffloader {
    objects: Arc<DashMap<String, StoredObject>>,
    base_url: String,
    ttl: Duration,
}

impl MemoryOffloader {
    /// Create a store handing out references below `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl: Duration::from_secs(SIGNED_URL_EXPIRY_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fetch a live object by its `{bucket}/{key}` path. Expired objects are evicted.
    pub fn get(&self, path: &str) -> Option<StoredObject> {
        let object = self.objects.get(path).map(|r| r.value().clone())?;
        if object.is_expired() {
            self.objects.remove(path);
            return None;
        }
        Some(object)
    }

    /// Drop every expired object, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, object| !object.is_expired());
        before - self.objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl PayloadOffloader for MemoryOffloader {
    async fn store(&self, request: OffloadRequest<'_>) -> Result<OffloadResult, OffloadError> {
        let key = object_key_now(request.group_id, request.request_id);
        let path = format!("{}/{}", request.bucket, key);

        self.objects.insert(
            path.clone(),
            StoredObject {
                content: request.content.to_string(),
                content_type: request.content_type.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        tracing::debug!(path = %path, bytes = request.content.len(), "Stored payload in memory");

        Ok(OffloadResult {
            url: Some(format!("{}/{}", self.base_url, path)),
            key: Some(key),
        })
    }
}
