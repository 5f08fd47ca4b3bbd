//! Listener TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    CertificateNotFound(String),

    #[error("private key file not found: {0}")]
    KeyNotFound(String),

    #[error("failed to load certificate/key pair: {0}")]
    Load(#[from] std::io::Error),
}

/// Load a rustls server config from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &str, key_path: &str) -> Result<RustlsConfig, TlsError> {
    if !Path::new(cert_path).exists() {
        return Err(TlsError::CertificateNotFound(cert_path.to_string()));
    }
    if !Path::new(key_path).exists() {
        return Err(TlsError::KeyNotFound(key_path.to_string()));
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::debug!(cert = %cert_path, "Loaded listener certificate");
    Ok(config)
}
