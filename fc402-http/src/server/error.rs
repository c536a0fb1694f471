//! Error types for the payment gate middleware.
//!
//! None of these escape the middleware: every variant is turned into a fresh
//! `402 Payment Required` response.

/// Reasons a submitted proof was refused.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    /// Proof header could not be decoded as a V2 proof.
    #[error("Invalid or malformed payment header")]
    InvalidPaymentHeader,
    /// The proof chose requirements the challenge does not offer.
    #[error("Unable to find matching payment requirements")]
    NoPaymentMatching,
    /// An external verifier rejected the proof.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

/// Why the gate did not pass a request through.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// No well-formed proof header was present.
    #[error("payment required")]
    PaymentRequired,
    /// A proof was present but the verifier refused it.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl PaygateError {
    /// Reason to embed in the challenge's `error` field, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::PaymentRequired => None,
            Self::Verification(err) => Some(err.to_string()),
        }
    }
}
