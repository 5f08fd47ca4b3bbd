//! Upstream TLS: the legacy certificate is checked against the configured
//! server name, not the address the proxy dials.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;

use mdm_migration_proxy::config::BackendConfig;
use mdm_migration_proxy::migration::RouteDecision;
use mdm_migration_proxy::upstream::{BackendProxy, ProxyError, UpstreamConnector};

// Test CA, and a leaf issued by it for DNS:mdm.example.com only.
const CA_DER: &[u8] = include_bytes!("fixtures/ca.der");
const SERVER_CERT_PEM: &[u8] = include_bytes!("fixtures/server.pem");
const SERVER_KEY_PEM: &[u8] = include_bytes!("fixtures/server.key");

async fn start_tls_backend() -> SocketAddr {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let tls = RustlsConfig::from_pem(SERVER_CERT_PEM.to_vec(), SERVER_KEY_PEM.to_vec())
        .await
        .unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(|| async { "legacy over tls" });
    tokio::spawn(async move {
        let _ = axum_server::tls_rustls::from_tcp_rustls(listener, tls)
            .serve(app.into_make_service())
            .await;
    });
    addr
}

fn test_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(CA_DER)).unwrap();
    roots
}

fn legacy_proxy(addr: SocketAddr, server_name: Option<&str>) -> BackendProxy {
    let config = BackendConfig {
        url: format!("https://{addr}"),
        tls_server_name: server_name.map(str::to_string),
    };
    let connector = UpstreamConnector::with_roots(
        Duration::from_secs(2),
        config.tls_server_name.as_deref(),
        test_roots(),
    )
    .unwrap();
    BackendProxy::with_connector(RouteDecision::Legacy, &config, connector, false).unwrap()
}

fn checkin() -> Request<Body> {
    Request::put("/mdm/checkin").body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_handshake_verifies_against_configured_name() {
    let addr = start_tls_backend().await;
    let proxy = legacy_proxy(addr, Some("mdm.example.com"));

    let response = proxy.forward(checkin(), None, "https").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"legacy over tls");
}

#[tokio::test]
async fn test_dial_address_alone_fails_verification() {
    let addr = start_tls_backend().await;
    let proxy = legacy_proxy(addr, None);

    let result = proxy.forward(checkin(), None, "https").await;
    assert!(matches!(result, Err(ProxyError::Upstream(_))));
}

#[tokio::test]
async fn test_mismatched_server_name_fails_verification() {
    let addr = start_tls_backend().await;
    let proxy = legacy_proxy(addr, Some("fleet.example.com"));

    let result = proxy.forward(checkin(), None, "https").await;
    assert!(matches!(result, Err(ProxyError::Upstream(_))));
}
