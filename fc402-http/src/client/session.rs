//! Explicit wallet session state.

use fc402::PaymentRequirements;
use fc402::chain::StacksAddress;
use serde_json::Value;
use tokio::sync::Mutex;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::error::SigningError;
use super::signer::PaymentSigner;

/// The connected wallet, owned by the caller and shared by reference.
///
/// The address is remembered after the first successful connection and only
/// forgotten by [`disconnect`](Self::disconnect).
#[derive(Debug)]
pub struct WalletSession<S> {
    signer: S,
    address: Mutex<Option<StacksAddress>>,
}

impl<S> WalletSession<S> {
    /// Creates a disconnected session around `signer`.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            address: Mutex::new(None),
        }
    }

    /// Returns the wrapped signer.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Address of the connected account, if any.
    pub async fn address(&self) -> Option<StacksAddress> {
        self.address.lock().await.clone()
    }

    /// Returns `true` if a wallet is connected.
    pub async fn is_connected(&self) -> bool {
        self.address.lock().await.is_some()
    }
}

impl<S: PaymentSigner> WalletSession<S> {
    /// Returns the connected address, connecting through the signer first if
    /// needed.
    ///
    /// Concurrent callers wait on the same connection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the wallet refuses, or
    /// [`SigningError::InvalidAddress`] if it returns something that is not a
    /// Stacks address.
    #[cfg_attr(feature = "telemetry", instrument(name = "fc402.wallet.connect", skip_all, err))]
    pub async fn ensure_connected(&self) -> Result<StacksAddress, SigningError> {
        let mut address = self.address.lock().await;
        if let Some(address) = address.as_ref() {
            return Ok(address.clone());
        }
        let raw = self.signer.connect().await?;
        let connected =
            StacksAddress::normalize(&raw).ok_or_else(|| SigningError::InvalidAddress(raw.clone()))?;
        #[cfg(feature = "telemetry")]
        tracing::info!(address = %connected.truncated(), "Wallet connected");
        *address = Some(connected.clone());
        Ok(connected)
    }

    /// Signs `requirements`, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] from connecting or signing.
    pub async fn sign(&self, requirements: &PaymentRequirements) -> Result<Value, SigningError> {
        let payer = self.ensure_connected().await?;
        let payload = self.signer.sign(requirements, &payer).await?;
        if payload.is_null() {
            return Err(SigningError::NoProof);
        }
        Ok(payload)
    }

    /// Forgets the connected address and tells the signer to disconnect.
    ///
    /// The address is cleared even if the signer reports an error.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] from the signer.
    pub async fn disconnect(&self) -> Result<(), SigningError> {
        self.address.lock().await.take();
        self.signer.disconnect().await
    }
}
