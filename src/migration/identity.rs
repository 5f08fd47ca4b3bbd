//! Device identity extraction from management-command bodies.
//!
//! Devices send property lists (XML or binary) whose top-level dictionary
//! carries a `UDID` string. Everything else in the document is ignored.

use std::io::Cursor;

use bytes::Bytes;
use thiserror::Error;

/// Top-level key holding the device identifier.
pub const UDID_KEY: &str = "UDID";

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The body is not a property list.
    #[error("malformed property list body: {source}")]
    MalformedBody {
        /// Raw body, kept for diagnostic logging.
        body: Bytes,
        #[source]
        source: plist::Error,
    },

    /// The property list decoded but carries no usable `UDID`.
    #[error("property list has no UDID")]
    MissingIdentifier,
}

/// Extract the device identifier from a request body.
///
/// An empty body yields an empty identifier: some command-channel requests
/// legitimately carry no payload.
pub fn extract_identifier(body: &[u8]) -> Result<String, IdentityError> {
    if body.is_empty() {
        return Ok(String::new());
    }

    let value = plist::Value::from_reader(Cursor::new(body)).map_err(|source| {
        IdentityError::MalformedBody {
            body: Bytes::copy_from_slice(body),
            source,
        }
    })?;

    value
        .as_dictionary()
        .and_then(|dict| dict.get(UDID_KEY))
        .and_then(plist::Value::as_string)
        .filter(|udid| !udid.is_empty())
        .map(str::to_owned)
        .ok_or(IdentityError::MissingIdentifier)
}
