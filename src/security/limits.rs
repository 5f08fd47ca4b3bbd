//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size before the body is decoded
//!
//! # Design Decisions
//! - Declared Content-Length is checked first (early rejection)
//! - The streamed body is capped as well, for chunked or lying clients
//! - Oversized bodies map to 413 Payload Too Large

use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyLimitError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(String),
}

/// Declared Content-Length, if present and well-formed.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Buffer a request body, refusing anything larger than `limit` bytes.
pub async fn read_body_limited(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, BodyLimitError> {
    if declared_length(headers).is_some_and(|len| len > limit as u64) {
        return Err(BodyLimitError::TooLarge { limit });
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(BodyLimitError::TooLarge { limit }),
        Err(e) => Err(BodyLimitError::Read(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn reads_body_within_limit() {
        let bytes = read_body_limited(&HeaderMap::new(), Body::from("hello"), 16)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn rejects_streamed_body_over_limit() {
        let err = read_body_limited(&HeaderMap::new(), Body::from(vec![0u8; 32]), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, BodyLimitError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn rejects_declared_length_over_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1048576"));
        let err = read_body_limited(&headers, Body::empty(), 1024).await.unwrap_err();
        assert!(matches!(err, BodyLimitError::TooLarge { .. }));
    }
}
