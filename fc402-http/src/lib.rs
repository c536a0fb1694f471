#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the 402FC payment handshake.
//!
//! Provides header names, header codecs and, behind feature flags, both halves of
//! the handshake:
//!
//! - **server**: an axum/tower layer that answers unpaid
//!   requests with `402 Payment Required` and a machine-readable challenge.
//! - **client**: a negotiator that performs the preflight, asks a wallet to sign
//!   the selected requirements, and retries once with the proof attached.
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names and defaults
//! - [`headers`] - Encoding/decoding of challenge, proof and acknowledgment headers
//! - [`error`] - Header codec errors
//! - [`server`] - Payment challenge issuer (feature: `server`)
//! - [`client`] - Payment proof negotiator (feature: `client`)
//!
//! # Feature Flags
//!
//! - `server` - axum middleware
//! - `client` - reqwest-based negotiator and middleware
//! - `telemetry` - `tracing` instrumentation
//! - `full` - everything above

pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;

pub use error::HttpError;
