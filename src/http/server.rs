//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the offloader and the response hook from configuration
//! - Create the Axum Router with the guarded application routes
//! - Serve offloaded payloads kept in memory under `/_payloads`
//! - Wire up middleware (tracing, timeout, request ID)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GuardMode, LargeResponseConfig, OffloadBackend};
use crate::guard::{ContentLengthObserver, GuardSettings, ResponseHook, ResponseSizeGuard};
use crate::http::layer::LargeResponseLayer;
use crate::offload::{HttpOffloader, MemoryOffloader, OffloadError, PayloadOffloader};

/// Route prefix serving payloads from the in-memory store.
pub const PAYLOADS_PREFIX: &str = "/_payloads";

/// How often expired objects are dropped from the in-memory store.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP server for the large-response demo application.
pub struct HttpServer {
    router: Router,
    config: LargeResponseConfig,
    memory: Option<MemoryOffloader>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: LargeResponseConfig) -> Result<Self, OffloadError> {
        let (offloader, memory) = build_offloader(&config)?;

        let hook: Arc<dyn ResponseHook> = match config.guard.mode {
            GuardMode::Rewrite => Arc::new(ResponseSizeGuard::new(
                GuardSettings::from(&config.guard),
                offloader,
            )),
            GuardMode::Observe => Arc::new(ContentLengthObserver::new(
                GuardSettings::from(&config.guard).thresholds,
            )),
        };

        tracing::info!(
            mode = ?config.guard.mode,
            backend = ?config.offload.backend,
            threshold_warn = config.guard.threshold_warn,
            threshold_error = config.guard.threshold_error,
            size_limit_in_mb = config.guard.size_limit_in_mb,
            "Response hook configured"
        );

        let router = Self::build_router(&config, hook, memory.clone());
        Ok(Self {
            router,
            config,
            memory,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Payload routes are merged outside the hook: a dereferencing client
    /// must receive the stored payload, whatever its size.
    #[allow(deprecated)]
    pub fn build_router(
        config: &LargeResponseConfig,
        hook: Arc<dyn ResponseHook>,
        memory: Option<MemoryOffloader>,
    ) -> Router {
        let mut router = Router::new()
            .route("/payload/{kb}", get(payload_handler))
            .layer(LargeResponseLayer::new(hook))
            .route("/health", get(|| async { "ok" }));

        if let Some(store) = memory {
            router = router.merge(
                Router::new()
                    .route(&format!("{PAYLOADS_PREFIX}/{{*path}}"), get(stored_payload_handler))
                    .with_state(store),
            );
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let purge = self.memory.map(|store| tokio::spawn(purge_expired(store)));

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        if let Some(task) = purge {
            task.abort();
        }
        result?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &LargeResponseConfig {
        &self.config
    }
}

/// Build the configured offloader; the memory store is also returned so it can be served.
pub fn build_offloader(
    config: &LargeResponseConfig,
) -> Result<(Arc<dyn PayloadOffloader>, Option<MemoryOffloader>), OffloadError> {
    let offload = &config.offload;
    match offload.backend {
        OffloadBackend::Memory => {
            let base_url = offload
                .public_base_url
                .clone()
                .unwrap_or_else(|| default_memory_base_url(&config.listener.bind_address));
            let store = MemoryOffloader::new(base_url)
                .with_ttl(Duration::from_secs(offload.url_expiry_secs));
            Ok((Arc::new(store.clone()), Some(store)))
        }
        OffloadBackend::Http => {
            let endpoint = offload
                .endpoint
                .clone()
                .ok_or_else(|| OffloadError::NotConfigured("offload.endpoint".to_string()))?;
            let mut offloader =
                HttpOffloader::with_timeout(endpoint, Duration::from_secs(offload.timeout_secs))?;
            if let Some(base_url) = &offload.public_base_url {
                offloader = offloader.with_public_base_url(base_url.clone());
            }
            Ok((Arc::new(offloader), None))
        }
    }
}

/// Base URL for in-memory references when `offload.public_base_url` is unset.
///
/// A wildcard bind address is not routable, so it is replaced by `localhost`
/// and only same-host clients can follow the references.
fn default_memory_base_url(bind_address: &str) -> String {
    match bind_address.parse::<SocketAddr>() {
        Ok(addr) if addr.ip().is_unspecified() => {
            tracing::warn!(
                bind_address = %bind_address,
                "offload.public_base_url is not set and the bind address is unspecified, \
                 payload references will only resolve on this host"
            );
            format!("http://localhost:{}{}", addr.port(), PAYLOADS_PREFIX)
        }
        _ => format!("http://{}{}", bind_address, PAYLOADS_PREFIX),
    }
}

/// Demo handler returning a JSON document of roughly `kb` kilobytes.
async fn payload_handler(Path(kb): Path<usize>) -> Response {
    let body = json!({
        "size_kb": kb,
        "data": "a".repeat(kb * 1024),
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Objects are keyed by their percent-encoded path, so the lookup uses the
/// raw request path rather than the decoded `{*path}` capture.
async fn stored_payload_handler(State(store): State<MemoryOffloader>, uri: Uri) -> Response {
    let path = uri
        .path()
        .strip_prefix(PAYLOADS_PREFIX)
        .unwrap_or_default()
        .trim_start_matches('/');
    match store.get(path) {
        Some(object) => ([(header::CONTENT_TYPE, object.content_type)], object.content).into_response(),
        None => (StatusCode::NOT_FOUND, "Payload not found or expired").into_response(),
    }
}

async fn purge_expired(store: MemoryOffloader) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        let removed = store.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "Purged expired payloads");
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_base_url_from_bind_address() {
        assert_eq!(
            default_memory_base_url("127.0.0.1:8080"),
            "http://127.0.0.1:8080/_payloads"
        );
    }

    #[test]
    fn test_memory_base_url_replaces_wildcard_address() {
        assert_eq!(
            default_memory_base_url("0.0.0.0:8080"),
            "http://localhost:8080/_payloads"
        );
        assert_eq!(
            default_memory_base_url("[::]:9000"),
            "http://localhost:9000/_payloads"
        );
    }
}
