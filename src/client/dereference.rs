//! Fetching the real payload behind a reference.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while dereferencing a payload reference.
#[derive(Debug, Error)]
pub enum DereferenceError {
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch returned status {0}")]
    Status(StatusCode),

    #[error("payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Capability turning a reference into the payload it points at.
#[async_trait]
pub trait Dereferencer: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Value, DereferenceError>;
}

/// Default dereferencer: GET the reference and parse the body as JSON.
///
/// By default a body that is a JSON string holding JSON text is unwrapped
/// once (see [`parse_payload`]). That is lossy for payloads which really are
/// such a string, e.g. `"123"` comes back as the number `123`; disable it
/// with [`HttpDereferencer::unwrap_double_encoded`] when producers never
/// double-encode.
#[derive(Clone)]
pub struct HttpDereferencer {
    client: Client,
    timeout: Option<Duration>,
    unwrap_double_encoded: bool,
}

impl HttpDereferencer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: None,
            unwrap_double_encoded: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn unwrap_double_encoded(mut self, unwrap: bool) -> Self {
        self.unwrap_double_encoded = unwrap;
        self
    }
}

#[async_trait]
impl Dereferencer for HttpDereferencer {
    async fn fetch(&self, reference: &str) -> Result<Value, DereferenceError> {
        let mut request = self.client.get(reference);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DereferenceError::Status(status));
        }

        let text = response.text().await?;
        if self.unwrap_double_encoded {
            Ok(parse_payload(&text)?)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}

/// Parse a stored payload. A JSON string that itself holds JSON is unwrapped
/// once, which is how some producers encode the stored body.
pub fn parse_payload(text: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if let Value::String(inner) = &value {
        if let Ok(decoded) = serde_json::from_str::<Value>(inner) {
            return Ok(decoded);
        }
    }
    Ok(value)
}

/// Dereferencer backed by an async closure.
pub struct FnDereferencer<F>(F);

#[async_trait]
impl<F, Fut> Dereferencer for FnDereferencer<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, DereferenceError>> + Send,
{
    async fn fetch(&self, reference: &str) -> Result<Value, DereferenceError> {
        (self.0)(reference.to_string()).await
    }
}

/// Wrap an async closure as a shareable [`Dereferencer`].
pub fn dereference_fn<F, Fut>(f: F) -> Arc<dyn Dereferencer>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, DereferenceError>> + Send + 'static,
{
    Arc::new(FnDereferencer(f))
}
