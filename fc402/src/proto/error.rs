//! Errors raised while encoding or decoding protocol messages.

/// Failure to turn bytes into a protocol message, or a message into bytes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding failed.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A challenge offered no payment options.
    #[error("payment challenge has an empty accepts list")]
    EmptyAccepts,

    /// A proof chose an option the challenge never offered.
    #[error("accepted requirements do not match any offered option")]
    AcceptedNotOffered,
}
