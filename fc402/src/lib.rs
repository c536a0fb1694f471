#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the 402FC payment handshake.
//!
//! A priced resource answers an unpaid request with `402 Payment Required` and a
//! machine-readable [`PaymentChallenge`](proto::PaymentChallenge). The client picks one
//! of the offered [`PaymentRequirements`](proto::PaymentRequirements), has a wallet sign
//! it, and retries with a base64-encoded [`PaymentProof`](proto::PaymentProof).
//!
//! This crate only defines the data exchanged on the wire. The HTTP plumbing (the
//! server-side gate and the client-side negotiator) lives in `fc402-http`.
//!
//! # Modules
//!
//! - [`amount`] - Smallest-unit amounts and their human-readable form
//! - [`chain`] - CAIP-2 chain identifiers and the Stacks network table
//! - [`proto`] - Wire format types, base64 JSON encoding and protocol errors

pub mod amount;
pub mod chain;
pub mod proto;

pub use amount::MicroAmount;
pub use chain::{ChainId, StacksNetwork};
pub use proto::{
    LegacyRequirements, PaymentAcknowledgment, PaymentChallenge, PaymentProof,
    PaymentRequirements, ProtocolError, ResourceInfo,
};
