//! Flattened payment requirements for clients that predate the V2 challenge.

use serde::{Deserialize, Serialize};

use super::v2::PaymentRequirements;
use crate::amount::MicroAmount;
use crate::chain::{ChainId, StacksNetwork};

/// Asset assumed when a legacy payload does not name one.
pub const DEFAULT_LEGACY_ASSET: &str = "STX";

fn default_asset() -> String {
    DEFAULT_LEGACY_ASSET.to_owned()
}

/// Single-level requirements object.
///
/// Appears as the `requirements` field of a 402 body and as plain JSON in the
/// `x-payment-required` header. Every field is optional on input because it is
/// also reassembled from loose `x-payment-*` headers, which may be partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRequirements {
    /// Amount in smallest units, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    /// Asset symbol.
    #[serde(default = "default_asset")]
    pub asset: String,

    /// Recipient address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,

    /// Short network name (`mainnet`, `testnet`) or a CAIP-2 identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Facilitator the server settles through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_url: Option<String>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for LegacyRequirements {
    fn default() -> Self {
        Self {
            amount: None,
            asset: default_asset(),
            pay_to: None,
            network: None,
            facilitator_url: None,
            description: None,
        }
    }
}

impl LegacyRequirements {
    /// Parsed amount, if present and a positive integer.
    #[must_use]
    pub fn amount(&self) -> Option<MicroAmount> {
        self.amount.as_deref()?.parse().ok()
    }

    /// Chain the requirements settle on.
    ///
    /// Short names go through [`StacksNetwork::resolve`]; a full CAIP-2 string is
    /// taken as is.
    #[must_use]
    pub fn chain_id(&self) -> Option<ChainId> {
        let network = self.network.as_deref()?;
        if network.contains(':') {
            network.parse().ok()
        } else {
            Some(StacksNetwork::resolve(network).chain_id())
        }
    }

    /// Rebuilds `exact` scheme requirements a wallet can sign.
    ///
    /// A missing network falls back to `fallback`. Returns `None` without a
    /// positive amount or a recipient.
    #[must_use]
    pub fn to_requirements(&self, fallback: &ChainId) -> Option<PaymentRequirements> {
        let amount = self.amount()?;
        let pay_to = self
            .pay_to
            .as_deref()
            .map(str::trim)
            .filter(|pay_to| !pay_to.is_empty())?;
        let network = self.chain_id().unwrap_or_else(|| fallback.clone());
        Some(PaymentRequirements::exact(
            network,
            amount,
            self.asset.as_str(),
            pay_to,
        ))
    }

    /// Returns `true` if nothing at all was recovered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.pay_to.is_none()
            && self.network.is_none()
            && self.facilitator_url.is_none()
            && self.description.is_none()
    }

    /// Human-readable prompt, e.g. `Payment required: 0.08 STX`.
    #[must_use]
    pub fn message(&self) -> String {
        match (self.description.as_deref(), self.amount()) {
            (Some(description), _) => description.to_owned(),
            (None, Some(amount)) => {
                format!("Payment required: {}", amount.display_with(&self.asset))
            }
            (None, None) => "Payment required".to_owned(),
        }
    }
}
