//! Error types for the HTTP transport layer.

use fc402::ProtocolError;

/// Errors that can occur during HTTP header encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Plain JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Protocol-level error (base64, version, empty accepts).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An encoded value is not a legal HTTP header value.
    #[cfg(any(feature = "client", feature = "server"))]
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
}
