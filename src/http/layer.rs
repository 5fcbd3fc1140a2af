//! Tower layer running a [`ResponseHook`] on buffered axum responses.
//!
//! # Responsibilities
//! - Capture the request view (headers, request id, identity) before the handler runs
//! - Buffer the handler response into a `ResponseEnvelope`
//! - Run the hook and rebuild the response only when it was rewritten
//!
//! # Design Decisions
//! - Untouched responses are forwarded with their original parts and bytes
//! - Non UTF-8 bodies are base64 encoded in the envelope, as API gateways do
//! - Repeated headers survive a rewrite unless the hook changed them

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use axum::http::response::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::guard::ResponseHook;
use crate::http::envelope::{Identity, RequestContext, ResponseEnvelope};
use crate::http::headers::Headers;

#[derive(Clone)]
pub struct LargeResponseLayer {
    hook: Arc<dyn ResponseHook>,
}

impl LargeResponseLayer {
    pub fn new(hook: Arc<dyn ResponseHook>) -> Self {
        Self { hook }
    }
}

impl<S> Layer<S> for LargeResponseLayer {
    type Service = LargeResponseService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LargeResponseService {
            inner,
            hook: self.hook.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LargeResponseService<S> {
    inner: S,
    hook: Arc<dyn ResponseHook>,
}

impl<S> Service<Request> for LargeResponseService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let ctx = request_context(&request);
        let hook = self.hook.clone();

        // The ready service must be the one that is called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(request).await?;
            Ok(apply_hook(hook.as_ref(), &ctx, response).await)
        })
    }
}

/// Build the read-only request view handed to hooks.
pub fn request_context(request: &Request) -> RequestContext {
    let mut ctx = RequestContext::new(Headers::from_header_map(request.headers()));
    ctx.identity = request.extensions().get::<Identity>().map(|i| i.0.clone());
    ctx.method = request.method().to_string();
    ctx.path = request.uri().path().to_string();
    ctx
}

/// Buffer `response`, run the hook, and rebuild the response if it was rewritten.
pub async fn apply_hook(hook: &dyn ResponseHook, ctx: &RequestContext, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = ?ctx.request_id, error = %e, "Failed to buffer response body");
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let mut envelope = envelope_from_parts(&parts, &bytes);
    let classification = hook.after(ctx, &mut envelope).await;

    if !classification.is_rewrite() {
        return Response::from_parts(parts, Body::from(bytes));
    }
    into_response(parts, envelope)
}

fn envelope_from_parts(parts: &Parts, bytes: &Bytes) -> ResponseEnvelope {
    let (body, is_base64_encoded) = match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (STANDARD.encode(bytes), true),
    };
    ResponseEnvelope {
        status_code: parts.status.as_u16(),
        headers: Headers::from_header_map(&parts.headers),
        body,
        is_base64_encoded,
    }
}

fn into_response(mut parts: Parts, envelope: ResponseEnvelope) -> Response {
    parts.status = StatusCode::from_u16(envelope.status_code).unwrap_or(parts.status);
    sync_headers(&mut parts.headers, &envelope.headers);
    parts.headers.remove(CONTENT_LENGTH);

    let body = if envelope.is_base64_encoded {
        match STANDARD.decode(&envelope.body) {
            Ok(bytes) => Body::from(bytes),
            Err(_) => Body::from(envelope.body),
        }
    } else {
        Body::from(envelope.body)
    };
    Response::from_parts(parts, body)
}

/// Apply the envelope headers to `map`, leaving unchanged entries (and their
/// repeated values) alone.
fn sync_headers(map: &mut HeaderMap, headers: &Headers) {
    let current = Headers::from_header_map(map);

    for (name, _) in current.iter() {
        if !headers.contains(name) {
            map.remove(name);
        }
    }

    for (name, value) in headers.iter() {
        if current.get(name) == Some(value) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping header that is not valid HTTP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Classification;
    use async_trait::async_trait;
    use axum::http::header::{CONTENT_TYPE, SET_COOKIE};

    struct Uppercase;

    #[async_trait]
    impl ResponseHook for Uppercase {
        async fn after(&self, _: &RequestContext, response: &mut ResponseEnvelope) -> Classification {
            response.body = response.body.to_uppercase();
            response.headers.insert("content-type", "text/shout");
            response.status_code = 202;
            Classification::ErrorHandled
        }
    }

    struct Untouched;

    #[async_trait]
    impl ResponseHook for Untouched {
        async fn after(&self, _: &RequestContext, response: &mut ResponseEnvelope) -> Classification {
            response.body.clear();
            Classification::Warn
        }
    }

    fn response(body: impl Into<Body>) -> Response {
        Response::builder()
            .header(CONTENT_TYPE, "text/plain")
            .header(CONTENT_LENGTH, "5")
            .header(SET_COOKIE, "a=1")
            .header(SET_COOKIE, "b=2")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_rewrite_is_applied() {
        let out = apply_hook(&Uppercase, &RequestContext::default(), response("hello")).await;

        assert_eq!(out.status(), StatusCode::ACCEPTED);
        assert_eq!(out.headers()[CONTENT_TYPE], "text/shout");
        assert!(out.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(out.headers().get_all(SET_COOKIE).iter().count(), 2);

        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"HELLO");
    }

    #[tokio::test]
    async fn test_non_rewrite_keeps_original_bytes() {
        let out = apply_hook(&Untouched, &RequestContext::default(), response("hello")).await;

        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.headers()[CONTENT_LENGTH], "5");
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_unreadable_body_drops_content_length() {
        let failing = futures_util::stream::iter(vec![Err::<Bytes, std::io::Error>(
            std::io::Error::other("connection reset"),
        )]);
        let out = apply_hook(&Uppercase, &RequestContext::default(), response(Body::from_stream(failing))).await;

        assert_eq!(out.status(), StatusCode::OK);
        assert!(out.headers().get(CONTENT_LENGTH).is_none());
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_binary_body_is_base64_encoded() {
        let (parts, _) = response(Body::empty()).into_parts();
        let bytes = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        let envelope = envelope_from_parts(&parts, &bytes);

        assert!(envelope.is_base64_encoded);
        assert_eq!(envelope.body, "//4A");
    }

    #[test]
    fn test_request_context_reads_extensions() {
        let mut request = Request::builder()
            .uri("/reports?x=1")
            .method("POST")
            .header("X-Request-Id", "req-1")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(Identity("org-1".into()));

        let ctx = request_context(&request);
        assert_eq!(ctx.request_id.as_deref(), Some("req-1"));
        assert_eq!(ctx.identity.as_deref(), Some("org-1"));
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/reports");
    }
}
