//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use large_response::config::{LargeResponseConfig, OffloadBackend};
use large_response::http::HttpServer;

/// Size limit for tests: 0.01 MB, so warn starts near 8 KB and error near 9.7 KB.
pub const TEST_SIZE_LIMIT_MB: f64 = 0.01;

/// Default config scaled down so `/payload/{kb}` crosses the bands with small bodies.
pub fn test_config() -> LargeResponseConfig {
    let mut config = LargeResponseConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.guard.size_limit_in_mb = TEST_SIZE_LIMIT_MB;
    config.offload.backend = OffloadBackend::Memory;
    config
}

/// A running server. Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind an ephemeral port and serve `config` on it.
///
/// With the memory backend and no explicit public URL, references point at
/// the bound address so they can be fetched back.
pub async fn spawn_server(mut config: LargeResponseConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    config.listener.bind_address = addr.to_string();
    if config.offload.backend == OffloadBackend::Memory && config.offload.public_base_url.is_none() {
        config.offload.public_base_url = Some(format!("http://{}/_payloads", addr));
    }

    let server = HttpServer::new(config).unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        addr,
        shutdown: Some(tx),
    }
}
