//! Error types for the client-side negotiator.

use std::fmt;
use std::time::Duration;

use fc402::PaymentChallenge;
use http::StatusCode;

use crate::error::HttpError;

/// Which step of a negotiation an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// The first request, sent without a proof.
    Preflight,
    /// Waiting on the wallet to connect or sign.
    Signing,
    /// The single retry carrying the proof.
    Retry,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preflight => "preflight",
            Self::Signing => "signing",
            Self::Retry => "retry",
        })
    }
}

/// A transport-level failure reported by a [`ResourceFetcher`](super::ResourceFetcher).
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TransportError(#[from] Box<dyn std::error::Error + Send + Sync>);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Failures of the external wallet capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// The user dismissed the wallet prompt.
    #[error("user cancelled the wallet request")]
    Cancelled,
    /// The wallet returned something that is not a Stacks address.
    #[error("wallet returned an invalid Stacks address: {0:?}")]
    InvalidAddress(String),
    /// The wallet cannot pay in the requested asset.
    #[error("unsupported asset for wallet payments: {0}")]
    UnsupportedAsset(String),
    /// The wallet produced no proof.
    #[error("wallet did not return a signed payment")]
    NoProof,
    /// Any other wallet failure.
    #[error("wallet error: {0}")]
    Wallet(String),
}

/// Typed outcome of a failed negotiation.
///
/// Transport problems, payment refusals and wallet failures are always
/// distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// Connecting to or talking with the server failed.
    #[error("network failure during {leg}: {source}")]
    Network {
        /// Leg that failed.
        leg: Leg,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// A request leg exceeded its time budget.
    #[error("{leg} timed out after {}s; the server may still be waiting for settlement", after.as_secs())]
    Timeout {
        /// Leg that timed out.
        leg: Leg,
        /// Budget that was exceeded.
        after: Duration,
    },
    /// The caller's cancellation token fired.
    #[error("{leg} was cancelled")]
    Cancelled {
        /// Leg in flight when cancelled.
        leg: Leg,
    },
    /// The wallet could not produce a proof.
    #[error("payment signing failed: {0}")]
    SigningFailed(#[source] SigningError),
    /// The retry carrying the proof was answered with another 402.
    #[error("payment declined: {message}")]
    PaymentDeclined {
        /// The new challenge, if the 402 carried one.
        challenge: Option<Box<PaymentChallenge>>,
        /// Server-supplied explanation.
        message: String,
    },
    /// The paid retry reached the resource but it failed with a server error.
    ///
    /// The payment is not refunded and the request is not retried again.
    #[error("upstream unavailable ({status}): {message}")]
    UpstreamUnavailable {
        /// Status of the retry.
        status: StatusCode,
        /// Server-supplied explanation, or the status reason.
        message: String,
    },
    /// Flattened requirements lack an amount or a recipient, so there is
    /// nothing a wallet could sign.
    #[error("payment requirements are incomplete: an amount and a recipient are needed")]
    IncompleteRequirements,
    /// The request body is a stream and cannot be sent a second time.
    #[error("request cannot be retried with a payment: body is not cloneable")]
    RequestNotCloneable,
    /// The proof could not be encoded into headers.
    #[error("could not encode payment proof: {0}")]
    Encode(#[from] HttpError),
}
