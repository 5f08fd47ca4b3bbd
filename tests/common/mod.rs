//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::Router;
use tokio::net::TcpListener;

use mdm_migration_proxy::config::BackendConfig;
use mdm_migration_proxy::migration::PolicyStore;
use mdm_migration_proxy::{HttpServer, ProxyConfig, Shutdown};

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// A running mock MDM server.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a backend that answers every request with `"<name>:<request body>"`
/// and reports what it saw in `x-seen-*` response headers.
pub async fn start_echo_backend(name: &'static str) -> MockBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let (parts, body) = request.into_parts();
            // Nothing borrowed from `parts` may live across the body await.
            let (host, forwarded_for, forwarded_proto, request_id, path) = {
                let seen = |name: &str| {
                    parts
                        .headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string()
                };
                (
                    seen(header::HOST.as_str()),
                    seen("x-forwarded-for"),
                    seen("x-forwarded-proto"),
                    seen("x-request-id"),
                    parts.uri.path().to_string(),
                )
            };

            let body = to_bytes(body, usize::MAX).await.unwrap();
            (
                [
                    ("x-backend", name.to_string()),
                    ("x-seen-host", host),
                    ("x-seen-forwarded-for", forwarded_for),
                    ("x-seen-forwarded-proto", forwarded_proto),
                    ("x-seen-request-id", request_id),
                    ("x-seen-path", path),
                ],
                format!("{name}:{}", String::from_utf8_lossy(&body)),
            )
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, hits }
}

/// Start a backend that waits `delay` before answering `"slow"`.
pub async fn start_slow_backend(delay: Duration) -> MockBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            "slow"
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, hits }
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Proxy configuration pointing at the given upstream URLs.
pub fn proxy_config(legacy_url: &str, new_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends.legacy = BackendConfig {
        url: legacy_url.into(),
        tls_server_name: None,
    };
    config.backends.new = BackendConfig {
        url: new_url.into(),
        tls_server_name: None,
    };
    config.admin.auth_token = Some(ADMIN_TOKEN.into());
    config.timeouts.connect_secs = 1;
    config
}

/// A proxy serving on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub policy: Arc<PolicyStore>,
    pub shutdown: Shutdown,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Build and start the proxy; returns once the listener is bound.
pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = std::net::TcpListener::bind(&config.listener.bind_address).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let policy = server.policy();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        policy,
        shutdown,
    }
}

/// Client that never goes through an environment proxy and never pools.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// An XML plist check-in message for `udid`.
pub fn checkin_body(udid: &str) -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    dict.insert("MessageType".into(), plist::Value::String("TokenUpdate".into()));
    dict.insert("UDID".into(), plist::Value::String(udid.into()));
    let mut buf = Vec::new();
    plist::Value::Dictionary(dict).to_writer_xml(&mut buf).unwrap();
    buf
}

/// A plist dictionary without a UDID.
pub fn body_without_udid() -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    dict.insert("MessageType".into(), plist::Value::String("Authenticate".into()));
    let mut buf = Vec::new();
    plist::Value::Dictionary(dict).to_writer_xml(&mut buf).unwrap();
    buf
}
