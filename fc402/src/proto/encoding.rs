//! Base64 JSON encoding for protocol messages carried in HTTP headers.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ProtocolError;

/// A wrapper for base64-encoded byte data.
///
/// This type holds bytes that represent base64-encoded data and provides
/// methods for encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// Surrounding ASCII whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(self.0.trim_ascii())
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Serializes `value` to JSON and base64-encodes the result.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Base64-decodes `encoded` and parses the bytes as JSON.
///
/// # Errors
///
/// Returns [`ProtocolError::Base64`] or [`ProtocolError::Json`] on malformed input.
pub fn decode_json<T: DeserializeOwned>(encoded: &[u8]) -> Result<T, ProtocolError> {
    let bytes = Base64Bytes::from(encoded).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}
