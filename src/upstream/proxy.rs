//! Single-host reverse proxy to one upstream.
//!
//! # Responsibilities
//! - Rewrite the request target onto the upstream base URL
//! - Strip hop-by-hop headers and add X-Forwarded-*
//! - Relay the upstream response (streamed, or buffered and logged in debug mode)
//!
//! # Design Decisions
//! - The inbound Host header is preserved
//! - No retries and no failover: an unreachable upstream is a 502

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::BackendConfig;
use crate::migration::RouteDecision;
use crate::security::headers::{apply_forwarded_headers, strip_hop_by_hop};
use crate::upstream::connector::UpstreamConnector;
use crate::upstream::ProxyError;

/// Reverse proxy for one of the two device-management servers.
#[derive(Clone)]
pub struct BackendProxy {
    target: RouteDecision,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    client: Client<UpstreamConnector, Body>,
    log_responses: bool,
}

impl std::fmt::Debug for BackendProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendProxy")
            .field("target", &self.target)
            .field("upstream", &format_args!("{}://{}{}", self.scheme, self.authority, self.base_path))
            .field("log_responses", &self.log_responses)
            .finish()
    }
}

impl BackendProxy {
    /// Build a proxy for `config.url`, verifying TLS against
    /// `config.tls_server_name` when set.
    pub fn new(
        target: RouteDecision,
        config: &BackendConfig,
        connect_timeout: Duration,
        log_responses: bool,
    ) -> Result<Self, ProxyError> {
        let connector = UpstreamConnector::new(connect_timeout, config.tls_server_name.as_deref())?;
        Self::with_connector(target, config, connector, log_responses)
    }

    /// Build a proxy for `config.url` over an already configured connector.
    pub fn with_connector(
        target: RouteDecision,
        config: &BackendConfig,
        connector: UpstreamConnector,
        log_responses: bool,
    ) -> Result<Self, ProxyError> {
        let url = Url::parse(&config.url).map_err(|e| ProxyError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        let base: Uri = url.as_str().parse().map_err(|e: axum::http::uri::InvalidUri| {
            ProxyError::InvalidUrl {
                url: config.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let (scheme, authority) = match (base.scheme(), base.authority()) {
            (Some(s), Some(a)) => (s.clone(), a.clone()),
            _ => {
                return Err(ProxyError::InvalidUrl {
                    url: config.url.clone(),
                    reason: "missing scheme or host".into(),
                })
            }
        };

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            target,
            scheme,
            authority,
            base_path: base.path().trim_end_matches('/').to_string(),
            client,
            log_responses,
        })
    }

    pub fn target(&self) -> RouteDecision {
        self.target
    }

    /// Upstream URI for an inbound target: base path joined with the inbound
    /// path, inbound query kept.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, ProxyError> {
        let path = inbound.path();
        let joined = match inbound.query() {
            Some(q) => format!("{}{}?{}", self.base_path, path, q),
            None => format!("{}{}", self.base_path, path),
        };
        let path_and_query: PathAndQuery = joined.parse().map_err(ProxyError::Uri)?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(ProxyError::Request)
    }

    /// Forward a request upstream and relay the response.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        forwarded_proto: &'static str,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        // HTTP/2 clients carry the host in the target, not a Host header.
        if !parts.headers.contains_key(header::HOST) {
            if let Some(authority) = parts.uri.authority() {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    parts.headers.insert(header::HOST, host);
                }
            }
        }
        let original_host = parts.headers.get(header::HOST).cloned();

        strip_hop_by_hop(&mut parts.headers);
        apply_forwarded_headers(
            &mut parts.headers,
            client_addr.map(|a| a.ip()),
            forwarded_proto,
            original_host.as_ref(),
        );

        parts.uri = self.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(ProxyError::Upstream)?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        if !self.log_responses {
            return Ok(Response::from_parts(parts, Body::new(body)));
        }

        let bytes = body
            .collect()
            .await
            .map_err(ProxyError::UpstreamBody)?
            .to_bytes();
        tracing::debug!(
            backend = %self.target,
            status = %parts.status,
            body = %String::from_utf8_lossy(&bytes),
            "Upstream response"
        );
        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}
