//! Axum middleware that gates routes behind an HTTP 402 payment handshake.
//!
//! An unpaid request is answered with `402 Payment Required`, a base64
//! [`PaymentChallenge`](fc402::PaymentChallenge) in the `payment-required` header,
//! legacy duplicates for older clients, and a JSON body carrying the same
//! challenge. A request carrying a well-formed proof header is handed to a
//! [`ProofVerifier`] and, if accepted, passed through to the protected handler
//! with a [`PaymentContext`] extension attached.
//!
//! See [`X402Middleware`] for configuration.
//!
//! ## Configuration Notes
//!
//! - **[`X402Middleware::with_price_tag`]** sets the requirements accepted for payment.
//! - **[`X402Middleware::with_base_url`]** sets the origin used for resource URLs.
//!   If not set, the origin is taken from `x-forwarded-proto` and `host`.
//! - **[`X402Middleware::with_verifier`]** plugs in settlement verification.
//!   The default [`PresenceVerifier`] accepts any well-formed proof.
//! - **[`X402LayerBuilder::with_description`]** tells the payer what is being bought.
//! - **[`X402LayerBuilder::with_resource`]** pins the resource URL explicitly.

pub mod context;
pub mod error;
pub mod layer;
pub mod paygate;
pub mod verifier;

pub use context::PaymentContext;
pub use error::{PaygateError, VerificationError};
pub use layer::{X402LayerBuilder, X402Middleware, X402MiddlewareService};
pub use paygate::{Paygate, ResourceInfoBuilder};
pub use verifier::{OfferedRequirementsVerifier, PresenceVerifier, ProofVerifier};
