//! Pluggable proof verification.
//!
//! The gate does not settle payments itself. It hands every well-formed proof to a
//! [`ProofVerifier`], which is where a facilitator client plugs in.

use std::sync::Arc;

use fc402::PaymentChallenge;

use super::context::PaymentContext;
use super::error::VerificationError;

/// Decides whether a submitted proof pays for `challenge`.
#[async_trait::async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Accepts or refuses the proof carried by `context`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] if the proof does not pay for the challenge.
    async fn verify(
        &self,
        context: &PaymentContext,
        challenge: &PaymentChallenge,
    ) -> Result<(), VerificationError>;
}

#[async_trait::async_trait]
impl<T: ProofVerifier + ?Sized> ProofVerifier for Arc<T> {
    async fn verify(
        &self,
        context: &PaymentContext,
        challenge: &PaymentChallenge,
    ) -> Result<(), VerificationError> {
        (**self).verify(context, challenge).await
    }
}

/// Accepts any well-formed proof without looking inside it.
///
/// A development stand-in: it lets the full handshake run end to end without a
/// facilitator. Do not use it where payments matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

#[async_trait::async_trait]
impl ProofVerifier for PresenceVerifier {
    async fn verify(
        &self,
        _context: &PaymentContext,
        _challenge: &PaymentChallenge,
    ) -> Result<(), VerificationError> {
        Ok(())
    }
}

/// Requires a decodable V2 proof whose `accepted` entry is one of the offered
/// requirements. Does not check settlement.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfferedRequirementsVerifier;

#[async_trait::async_trait]
impl ProofVerifier for OfferedRequirementsVerifier {
    async fn verify(
        &self,
        context: &PaymentContext,
        challenge: &PaymentChallenge,
    ) -> Result<(), VerificationError> {
        let proof = context
            .proof
            .as_ref()
            .ok_or(VerificationError::InvalidPaymentHeader)?;
        if challenge.offers(&proof.accepted) {
            Ok(())
        } else {
            Err(VerificationError::NoPaymentMatching)
        }
    }
}
