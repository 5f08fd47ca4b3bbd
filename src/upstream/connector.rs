//! Upstream transport with optional TLS server-name override.
//!
//! The legacy backend is dialed by IP or internal name while its certificate
//! names a public host, so verification must use a configured name instead
//! of the connection address.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::uri::Scheme;
use axum::http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower::Service;

use crate::upstream::ProxyError;

/// Root store from the platform trust store.
pub fn native_roots() -> RootCertStore {
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::warn!(error = %error, "Failed to load a native root certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");
    roots
}

fn client_tls_config(roots: RootCertStore) -> Result<rustls::ClientConfig, ProxyError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(ProxyError::Tls)?
        .with_root_certificates(roots)
        .with_no_client_auth();
    // The pooled client speaks HTTP/1.1 upstream.
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

/// Connector for one upstream: plain TCP for `http`, rustls for `https`.
#[derive(Clone)]
pub struct UpstreamConnector {
    http: HttpConnector,
    tls: TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl UpstreamConnector {
    /// Build a connector trusting the platform roots. `server_name` overrides
    /// the name checked against the upstream certificate.
    pub fn new(connect_timeout: Duration, server_name: Option<&str>) -> Result<Self, ProxyError> {
        Self::with_roots(connect_timeout, server_name, native_roots())
    }

    /// Build a connector trusting only `roots`.
    pub fn with_roots(
        connect_timeout: Duration,
        server_name: Option<&str>,
        roots: RootCertStore,
    ) -> Result<Self, ProxyError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(connect_timeout));

        let server_name = server_name
            .map(|name| {
                ServerName::try_from(name.to_owned())
                    .map_err(|_| ProxyError::InvalidServerName(name.to_owned()))
            })
            .transpose()?;

        Ok(Self {
            http,
            tls: TlsConnector::from(Arc::new(client_tls_config(roots)?)),
            server_name,
        })
    }

    fn server_name_for(&self, uri: &Uri) -> io::Result<ServerName<'static>> {
        if let Some(name) = &self.server_name {
            return Ok(name.clone());
        }
        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "upstream URI has no host"))?;
        ServerName::try_from(host.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

impl Service<Uri> for UpstreamConnector {
    type Response = UpstreamStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(io::Error::other)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let server_name = if uri.scheme() == Some(&Scheme::HTTPS) {
            match self.server_name_for(&uri) {
                Ok(name) => Some(name),
                Err(e) => return Box::pin(async move { Err(e) }),
            }
        } else {
            None
        };
        let connecting = self.http.call(uri);
        let tls = self.tls.clone();

        Box::pin(async move {
            let tcp = connecting.await.map_err(io::Error::other)?.into_inner();
            let stream = match server_name {
                Some(name) => MaybeTls::Tls(Box::new(tls.connect(name, tcp).await?)),
                None => MaybeTls::Plain(tcp),
            };
            Ok(UpstreamStream {
                io: TokioIo::new(stream),
            })
        })
    }
}

enum MaybeTls {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTls {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTls {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTls::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A connection to an upstream, as handed to the hyper client pool.
pub struct UpstreamStream {
    io: TokioIo<MaybeTls>,
}

impl Connection for UpstreamStream {
    fn connected(&self) -> Connected {
        match self.io.inner() {
            MaybeTls::Plain(s) => s.connected(),
            MaybeTls::Tls(s) => s.get_ref().0.connected(),
        }
    }
}

impl hyper::rt::Read for UpstreamStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.get_mut().io), cx, buf)
    }
}

impl hyper::rt::Write for UpstreamStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.get_mut().io), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.get_mut().io), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.get_mut().io), cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_uri_host() {
        let connector =
            UpstreamConnector::new(Duration::from_secs(1), Some("mdm.example.com")).unwrap();
        let uri: Uri = "https://10.0.0.5/mdm/checkin".parse().unwrap();
        let name = connector.server_name_for(&uri).unwrap();
        assert_eq!(name.to_str(), "mdm.example.com");
    }

    #[test]
    fn falls_back_to_uri_host() {
        let connector = UpstreamConnector::new(Duration::from_secs(1), None).unwrap();
        let uri: Uri = "https://fleet.internal/mdm".parse().unwrap();
        assert_eq!(connector.server_name_for(&uri).unwrap().to_str(), "fleet.internal");
    }

    #[test]
    fn rejects_invalid_override() {
        assert!(matches!(
            UpstreamConnector::new(Duration::from_secs(1), Some("not a hostname!")),
            Err(ProxyError::InvalidServerName(_))
        ));
    }
}
