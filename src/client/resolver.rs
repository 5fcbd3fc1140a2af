//! The large-response resolver.
//!
//! # Responsibilities
//! - Advertise the reference capability on outgoing requests
//! - Detect a reference envelope in a response and swap in the real payload
//!
//! # Design Decisions
//! - Disabled unless `enabled` is set; an unset value warns once per resolver
//! - Activation needs both the sentinel content type and a truthy reference
//! - A failed fetch yields `error_payload` when configured, else the error

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::client::dereference::{DereferenceError, Dereferencer, HttpDereferencer};
use crate::client::options::{EffectiveOptions, ResolverOptions};
use crate::config::schema::ResolverConfig;
use crate::http::headers::Headers;
use crate::observability::{metrics, Logger, TracingLogger};

/// A response as seen by the resolver: status, headers, and the parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub data: Value,
}

impl ClientResponse {
    pub fn new(status: StatusCode, headers: Headers, data: Value) -> Self {
        Self {
            status,
            headers,
            data,
        }
    }

    /// Read a reqwest response. Bodies that are not JSON are kept as a string.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = Headers::from_header_map(response.headers());
        let text = response.text().await?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(Self::new(status, headers, data))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Dereference(#[from] DereferenceError),
}

/// Client-side counterpart of the response size guard.
#[derive(Clone)]
pub struct ReferenceResolver {
    client: Client,
    global: ResolverOptions,
    default_dereferencer: Arc<dyn Dereferencer>,
}

impl ReferenceResolver {
    pub fn new(client: Client, global: ResolverOptions) -> Self {
        if global.enabled.is_none() && global.disable_warnings != Some(true) {
            let logger: Arc<dyn Logger> = global
                .logger
                .clone()
                .unwrap_or_else(|| Arc::new(TracingLogger));
            logger.warn(
                "[LargeResponseResolver] 'enabled' is not set, large responses will not be resolved. Set it explicitly or pass disable_warnings to silence this message.",
                &json!({}),
            );
        }

        let default_dereferencer: Arc<dyn Dereferencer> =
            Arc::new(HttpDereferencer::new(client.clone()));
        Self {
            client,
            global,
            default_dereferencer,
        }
    }

    /// Build a resolver from the `[resolver]` configuration section.
    pub fn from_config(client: Client, config: &ResolverConfig) -> Self {
        let mut resolver = Self::new(client, ResolverOptions::from(config));
        if let Some(secs) = config.fetch_timeout_secs {
            resolver.default_dereferencer = Arc::new(
                HttpDereferencer::new(resolver.client.clone())
                    .with_timeout(Duration::from_secs(secs)),
            );
        }
        resolver
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Effective options for one call.
    pub fn options(&self, per_call: Option<&ResolverOptions>) -> EffectiveOptions {
        EffectiveOptions::resolve(&self.global, per_call, &self.default_dereferencer)
    }

    /// Request hook: advertise that reference envelopes are understood.
    pub fn on_request(&self, request: &mut reqwest::Request, per_call: Option<&ResolverOptions>) {
        let options = self.options(per_call);
        if !options.enabled {
            return;
        }
        match HeaderValue::from_str(&options.header_flag) {
            Ok(value) => {
                request.headers_mut().insert(ACCEPT, value);
            }
            Err(_) => tracing::warn!(
                header_flag = %options.header_flag,
                "Header flag is not a valid header value, request sent unchanged"
            ),
        }
    }

    /// Response hook: dereference a reference envelope.
    pub async fn on_response(
        &self,
        mut response: ClientResponse,
        per_call: Option<&ResolverOptions>,
    ) -> Result<ClientResponse, DereferenceError> {
        let options = self.options(per_call);
        if !options.enabled {
            return Ok(response);
        }

        let Some(reference) = reference_of(&response, &options) else {
            return Ok(response);
        };

        if options.debug {
            options.logger.debug(
                "[LargeResponseResolver] Fetching large payload from ref url",
                &json!({ "ref": reference }),
            );
        }

        match options.dereferencer.fetch(&reference).await {
            Ok(payload) => {
                metrics::record_dereference("ok");
                response.data = payload;
                Ok(response)
            }
            Err(e) => {
                metrics::record_dereference("error");
                options.logger.error(
                    "[LargeResponseResolver] Error fetching large payload from ref url",
                    &json!({ "reason": e.to_string(), "ref": reference }),
                );
                match options.error_payload {
                    Some(payload) => {
                        response.data = payload;
                        Ok(response)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Run `builder` through both hooks.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        per_call: Option<&ResolverOptions>,
    ) -> Result<ClientResponse, ResolveError> {
        let mut request = builder.build()?;
        self.on_request(&mut request, per_call);

        let response = self.client.execute(request).await?;
        let response = ClientResponse::from_reqwest(response).await?;
        Ok(self.on_response(response, per_call).await?)
    }

    pub async fn get(
        &self,
        url: &str,
        per_call: Option<&ResolverOptions>,
    ) -> Result<ClientResponse, ResolveError> {
        self.send(self.client.get(url), per_call).await
    }
}

fn reference_of(response: &ClientResponse, options: &EffectiveOptions) -> Option<String> {
    let content_type = response.content_type()?;
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case(&options.header_flag) {
        return None;
    }

    let reference = response.data.get(options.ref_property.as_str())?;
    if !is_truthy(reference) {
        return None;
    }
    Some(match reference {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// JSON truthiness: `null`, `false`, `0`, and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::dereference::dereference_fn;
    use crate::guard::{Classification, GuardSettings, ResponseHook, ResponseSizeGuard, Thresholds};
    use crate::http::envelope::{RequestContext, ResponseEnvelope};
    use crate::observability::MemoryLogger;
    use crate::offload::MemoryOffloader;
    use crate::protocol::LARGE_RESPONSE_MIME_TYPE;
    use tracing::Level;

    fn reference_response(data: Value) -> ClientResponse {
        let mut headers = Headers::new();
        headers.insert("content-type", LARGE_RESPONSE_MIME_TYPE);
        ClientResponse::new(StatusCode::OK, headers, data)
    }

    fn resolver(options: ResolverOptions) -> ReferenceResolver {
        ReferenceResolver::new(Client::new(), options.disable_warnings(true))
    }

    fn fixed(payload: Value) -> Arc<dyn Dereferencer> {
        dereference_fn(move |_| {
            let payload = payload.clone();
            async move { Ok::<_, DereferenceError>(payload) }
        })
    }

    fn failing() -> Arc<dyn Dereferencer> {
        dereference_fn(|_| async { Err::<Value, _>(DereferenceError::Other("object expired".into())) })
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("s3://bucket/key")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn test_on_request_sets_accept_when_enabled() {
        let resolver = resolver(ResolverOptions::new().enabled(true));
        let mut request = Client::new().get("http://localhost/x").build().unwrap();
        resolver.on_request(&mut request, None);
        assert_eq!(request.headers()[ACCEPT], LARGE_RESPONSE_MIME_TYPE);
    }

    #[test]
    fn test_on_request_disabled_per_call() {
        let resolver = resolver(ResolverOptions::new().enabled(true));
        let mut request = Client::new().get("http://localhost/x").build().unwrap();
        resolver.on_request(&mut request, Some(&ResolverOptions::new().enabled(false)));
        assert!(request.headers().get(ACCEPT).is_none());
    }

    #[tokio::test]
    async fn test_dereferences_reference_envelope() {
        let resolver = resolver(
            ResolverOptions::new()
                .enabled(true)
                .dereferencer(fixed(json!({ "items": [1, 2] }))),
        );

        let out = resolver
            .on_response(reference_response(json!({ "$payload_ref": "http://s3/key" })), None)
            .await
            .unwrap();
        assert_eq!(out.data, json!({ "items": [1, 2] }));
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let resolver = resolver(ResolverOptions::new().dereferencer(fixed(json!("fetched"))));
        let data = json!({ "$payload_ref": "http://s3/key" });

        let out = resolver.on_response(reference_response(data.clone()), None).await.unwrap();
        assert_eq!(out.data, data);
    }

    #[tokio::test]
    async fn test_requires_content_type_and_reference() {
        let resolver = resolver(
            ResolverOptions::new()
                .enabled(true)
                .dereferencer(fixed(json!("fetched"))),
        );

        let plain = ClientResponse::new(
            StatusCode::OK,
            Headers::from_iter([("content-type", "application/json")]),
            json!({ "$payload_ref": "http://s3/key" }),
        );
        let out = resolver.on_response(plain.clone(), None).await.unwrap();
        assert_eq!(out, plain);

        let empty_ref = reference_response(json!({ "$payload_ref": "" }));
        let out = resolver.on_response(empty_ref.clone(), None).await.unwrap();
        assert_eq!(out, empty_ref);
    }

    #[tokio::test]
    async fn test_custom_ref_property_per_call() {
        let resolver = resolver(
            ResolverOptions::new()
                .enabled(true)
                .dereferencer(fixed(json!("fetched"))),
        );
        let per_call = ResolverOptions::new().ref_property("_ref");

        let out = resolver
            .on_response(reference_response(json!({ "_ref": "http://s3/key" })), Some(&per_call))
            .await
            .unwrap();
        assert_eq!(out.data, json!("fetched"));
    }

    #[tokio::test]
    async fn test_failure_uses_error_payload() {
        let logger = Arc::new(MemoryLogger::new());
        let resolver = resolver(
            ResolverOptions::new()
                .enabled(true)
                .dereferencer(failing())
                .logger(logger.clone())
                .error_payload(json!({ "error": "unavailable" })),
        );

        let out = resolver
            .on_response(reference_response(json!({ "$payload_ref": "http://s3/key" })), None)
            .await
            .unwrap();
        assert_eq!(out.data, json!({ "error": "unavailable" }));

        let errors = logger.at(Level::ERROR);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "[LargeResponseResolver] Error fetching large payload from ref url"
        );
        assert_eq!(errors[0].fields["reason"], "object expired");
    }

    #[tokio::test]
    async fn test_failure_without_error_payload_propagates() {
        let resolver = resolver(ResolverOptions::new().enabled(true).dereferencer(failing()));
        let err = resolver
            .on_response(reference_response(json!({ "$payload_ref": "http://s3/key" })), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DereferenceError::Other(_)));
    }

    #[tokio::test]
    async fn test_debug_logs_reference() {
        let logger = Arc::new(MemoryLogger::with_debug());
        let resolver = resolver(
            ResolverOptions::new()
                .enabled(true)
                .debug(true)
                .logger(logger.clone())
                .dereferencer(fixed(json!(null))),
        );

        resolver
            .on_response(reference_response(json!({ "$payload_ref": "http://s3/key" })), None)
            .await
            .unwrap();

        let debug = logger.at(Level::DEBUG);
        assert_eq!(debug.len(), 1);
        assert_eq!(debug[0].fields["ref"], "http://s3/key");
    }

    #[test]
    fn test_unset_enabled_warns_once() {
        let logger = Arc::new(MemoryLogger::new());
        let _ = ReferenceResolver::new(Client::new(), ResolverOptions::new().logger(logger.clone()));
        assert_eq!(logger.count(Level::WARN), 1);

        let muted = Arc::new(MemoryLogger::new());
        let _ = ReferenceResolver::new(
            Client::new(),
            ResolverOptions::new().logger(muted.clone()).disable_warnings(true),
        );
        assert_eq!(muted.count(Level::WARN), 0);

        let explicit = Arc::new(MemoryLogger::new());
        let _ = ReferenceResolver::new(
            Client::new(),
            ResolverOptions::new().logger(explicit.clone()).enabled(false),
        );
        assert_eq!(explicit.count(Level::WARN), 0);
    }

    #[tokio::test]
    async fn test_guard_to_resolver_round_trip() {
        let store = MemoryOffloader::new("http://payloads.local");
        let guard = ResponseSizeGuard::new(
            GuardSettings::new(Thresholds::new(0.8, 0.95, 0.001), "bucket"),
            Arc::new(store.clone()),
        )
        .with_logger(Arc::new(MemoryLogger::new()));

        let original = json!({ "rows": "x".repeat(2048) });
        let mut envelope = ResponseEnvelope::new(axum::http::StatusCode::OK, original.to_string())
            .with_header("content-type", "application/json");
        let ctx = RequestContext::new(Headers::from_iter([("accept", LARGE_RESPONSE_MIME_TYPE)]))
            .with_request_id("req-1");

        assert_eq!(guard.after(&ctx, &mut envelope).await, Classification::ErrorAccepted);

        let dereferencer = {
            let store = store.clone();
            dereference_fn(move |reference| {
                let object = reference
                    .strip_prefix("http://payloads.local/")
                    .and_then(|path| store.get(path));
                async move {
                    let object = object.ok_or_else(|| DereferenceError::Other("missing".into()))?;
                    Ok::<Value, DereferenceError>(serde_json::from_str(&object.content)?)
                }
            })
        };
        let resolver = resolver(ResolverOptions::new().enabled(true).dereferencer(dereferencer));

        let response = ClientResponse::new(
            StatusCode::from_u16(envelope.status_code).unwrap(),
            envelope.headers.clone(),
            serde_json::from_str(&envelope.body).unwrap(),
        );
        let out = resolver.on_response(response, None).await.unwrap();
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(out.data, original);
    }
}
