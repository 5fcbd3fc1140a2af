//! Request/response views handed to the response hooks.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::http::headers::Headers;

/// Buffered response produced by a handler, mutated in place by a hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ResponseEnvelope {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: Headers::new(),
            body: body.into(),
            is_base64_encoded: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Identity established by an upstream authorizer, read from request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// Read-only view of the request that produced a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub headers: Headers,
    pub request_id: Option<String>,
    pub identity: Option<String>,
    pub method: String,
    pub path: String,
}

impl RequestContext {
    pub fn new(headers: Headers) -> Self {
        let request_id = headers.get("x-request-id").map(str::to_string);
        Self {
            headers,
            request_id,
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Compact JSON description used as log context.
    pub fn log_context(&self) -> serde_json::Value {
        serde_json::json!({
            "request_id": self.request_id,
            "identity": self.identity,
            "method": self.method,
            "path": self.path,
        })
    }
}
