//! Wire format for the HTTP 402 payment handshake.
//!
//! All types serialize to JSON using camelCase field names and carry the
//! protocol version in an `x402Version` field.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - One acceptable way to pay for a resource
//! - [`PaymentChallenge`] - The full 402 payload listing every accepted option
//! - [`PaymentProof`] - Client evidence that it paid for one of the options
//! - [`PaymentAcknowledgment`] - Optional server receipt after the gate passes
//! - [`LegacyRequirements`] - Flattened requirements for clients that predate V2
//!
//! # Encoding
//!
//! Challenges, proofs and acknowledgments travel in HTTP headers as base64
//! encoded JSON; see [`encode_json`] and [`decode_json`].

mod encoding;
mod error;
mod legacy;
mod v2;
mod version;

pub use encoding::{Base64Bytes, decode_json, encode_json};
pub use error::ProtocolError;
pub use legacy::{DEFAULT_LEGACY_ASSET, LegacyRequirements};
pub use v2::{
    DEFAULT_MAX_TIMEOUT_SECONDS, EXACT_SCHEME, PaymentAcknowledgment, PaymentChallenge, PaymentProof, PaymentRequirements,
    ResourceInfo,
};
pub use version::{V2, Version, X402Version2};
