//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state (classifier, policy store, both backend proxies)
//! - Create the Axum router: health, admin, and the dispatch fallback
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Serve plain HTTP or TLS on a pre-bound listener until shutdown
//!
//! # Design Decisions
//! - The listener is bound by the caller so tests can use ephemeral ports
//! - Header read timeout is enforced at the connection level by hyper
//! - Shutdown drains in-flight requests for a bounded grace period

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use axum_server::Handle;
use hyper_util::rt::TokioTimer;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::dispatch::dispatch;
use crate::http::request::MakeRequestUuidV4;
use crate::migration::{MigrationPolicy, Percentage, PolicyError, PolicyStore, RouteDecision};
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::metrics;
use crate::routing::Classifier;
use crate::upstream::{BackendProxy, ProxyError};

pub const HEALTH_PATH: &str = "/healthz";

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid migration policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("backend setup failed: {0}")]
    Proxy(#[from] ProxyError),

    #[error("listener TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<Classifier>,
    pub policy: Arc<PolicyStore>,
    pub legacy: Arc<BackendProxy>,
    pub new: Arc<BackendProxy>,
    pub admin_secret: Option<Arc<str>>,
    pub max_body_size: usize,
    pub debug: bool,
    pub log_skipped: bool,
    pub forwarded_proto: &'static str,
}

impl AppState {
    /// The proxy serving a routing decision.
    pub fn backend(&self, decision: RouteDecision) -> &BackendProxy {
        match decision {
            RouteDecision::Legacy => &self.legacy,
            RouteDecision::New => &self.new,
        }
    }
}

/// HTTP server for the migration proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    policy: Arc<PolicyStore>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Expects a validated config; an out-of-range percentage or an
    /// unusable backend URL is still reported rather than panicking.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let percentage = Percentage::try_from(config.migration.percentage)?;
        let policy = Arc::new(PolicyStore::new(MigrationPolicy::new(
            config.migration.udids.iter().map(|u| u.trim()).filter(|u| !u.is_empty()),
            percentage,
        )));
        metrics::set_percentage(percentage.get());

        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);
        // Legacy responses are never buffered; debug mode only inspects the new server.
        let legacy = BackendProxy::new(
            RouteDecision::Legacy,
            &config.backends.legacy,
            connect_timeout,
            false,
        )?;
        let new = BackendProxy::new(
            RouteDecision::New,
            &config.backends.new,
            connect_timeout,
            config.observability.debug,
        )?;

        let state = AppState {
            classifier: Arc::new(Classifier::new()),
            policy: policy.clone(),
            legacy: Arc::new(legacy),
            new: Arc::new(new),
            admin_secret: config.admin.secret().map(Arc::from),
            max_body_size: config.security.max_body_size,
            debug: config.observability.debug,
            log_skipped: config.observability.log_skipped,
            forwarded_proto: if config.listener.tls.is_some() { "https" } else { "http" },
        };

        if state.admin_secret.is_none() {
            tracing::warn!("No admin auth token configured; admin endpoints will reject every request");
        }
        tracing::info!(
            legacy = ?state.legacy,
            new = ?state.new,
            percentage = percentage.get(),
            udids = config.migration.udids.len(),
            "Migration proxy configured"
        );

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            policy,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(|| async { "OK" }))
            .merge(setup_admin_router(state.clone()))
            .fallback(dispatch)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// The router, for driving handlers without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared handle to the live migration policy.
    pub fn policy(&self) -> Arc<PolicyStore> {
        self.policy.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let handle = Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!(grace = ?grace, "Draining connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        let read_header = Duration::from_secs(self.config.timeouts.read_header_secs);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(&tls.cert_path, &tls.key_path).await?;
                tracing::info!(address = %addr, "HTTPS server starting");

                let mut server = axum_server::tls_rustls::from_tcp_rustls(listener, rustls)
                    .handle(handle);
                server
                    .http_builder()
                    .http1()
                    .timer(TokioTimer::new())
                    .header_read_timeout(read_header);
                server.serve(app).await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");

                let mut server = axum_server::from_tcp(listener).handle(handle);
                server
                    .http_builder()
                    .http1()
                    .timer(TokioTimer::new())
                    .header_read_timeout(read_header);
                server.serve(app).await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
