//! The wallet capability the negotiator delegates to.

use fc402::PaymentRequirements;
use fc402::chain::StacksAddress;
use serde_json::Value;

use super::error::SigningError;

/// An external wallet able to connect and sign payments.
///
/// Implementations wrap a browser extension, a hardware wallet or a local key.
/// The negotiator never signs anything itself; it only sequences these calls and
/// wraps the returned payload into a [`PaymentProof`](fc402::PaymentProof).
#[async_trait::async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Connects the wallet and returns the account address.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the user refuses or the wallet is unavailable.
    async fn connect(&self) -> Result<String, SigningError>;

    /// Produces the mechanism-specific evidence for `requirements`, typically
    /// `{"transaction": "<signed tx hex>"}`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the wallet cannot or will not sign.
    async fn sign(
        &self,
        requirements: &PaymentRequirements,
        payer: &StacksAddress,
    ) -> Result<Value, SigningError>;

    /// Releases the wallet connection.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the wallet reports a failure.
    async fn disconnect(&self) -> Result<(), SigningError> {
        Ok(())
    }
}
