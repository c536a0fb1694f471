//! Choosing which offered option to pay.

use fc402::{ChainId, PaymentChallenge, PaymentRequirements};

/// Caller preference among a challenge's options.
///
/// Selection order: an option matching both asset and network, then one
/// matching the asset alone, then the first option offered. Asset symbols
/// compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentPreference {
    /// Preferred asset symbol, e.g. `STX`.
    pub asset: Option<String>,
    /// Preferred network.
    pub network: Option<ChainId>,
}

impl PaymentPreference {
    /// No preference: the first offered option is used.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefers options in `asset`.
    #[must_use]
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Prefers options on `network`.
    #[must_use]
    pub fn with_network(mut self, network: ChainId) -> Self {
        self.network = Some(network);
        self
    }

    /// Picks an option from `challenge`, or `None` if it offers nothing.
    #[must_use]
    pub fn select<'a>(&self, challenge: &'a PaymentChallenge) -> Option<&'a PaymentRequirements> {
        let asset_matches = |option: &PaymentRequirements| {
            self.asset
                .as_deref()
                .is_some_and(|asset| option.asset.eq_ignore_ascii_case(asset))
        };
        let accepts = &challenge.accepts;
        accepts
            .iter()
            .find(|&option| asset_matches(option) && self.network.as_ref() == Some(&option.network))
            .or_else(|| accepts.iter().find(|&option| asset_matches(option)))
            .or_else(|| accepts.first())
    }
}
