//! Price tiers of the paid endpoints, in micro-STX.

use fc402::{MicroAmount, PaymentRequirements, StacksNetwork};
use fc402::chain::StacksAddress;
use serde::Serialize;

/// Asset every tier is priced in.
pub const CURRENCY: &str = "STX";

#[allow(clippy::panic)] // only evaluated in constants
const fn micro_stx(value: u64) -> MicroAmount {
    match MicroAmount::new(value) {
        Some(amount) => amount,
        None => panic!("prices must be positive"),
    }
}

/// A priced endpoint as listed by `GET /api/pricing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    /// Route pattern, e.g. `/api/streams/:streamId/watch`.
    pub endpoint: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Marketing description.
    pub description: &'static str,
    /// Price in micro-STX.
    #[serde(rename = "price")]
    pub amount: MicroAmount,
    /// Emoji shown next to the tier.
    pub icon: &'static str,
    /// Prompt shown by the payment gate.
    #[serde(skip)]
    pub unlock: &'static str,
}

impl PriceTier {
    /// Price with its unit, e.g. `0.08 STX`.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.amount.display_with(CURRENCY)
    }

    /// The option a challenge for this tier offers.
    #[must_use]
    pub fn requirements(&self, network: StacksNetwork, pay_to: &StacksAddress) -> PaymentRequirements {
        PaymentRequirements::exact(network.chain_id(), self.amount, CURRENCY, pay_to.as_str())
    }
}

/// Match highlights video.
pub const HIGHLIGHTS: PriceTier = PriceTier {
    endpoint: "/api/highlights/:matchId",
    name: "Match Highlights",
    description: "Official video highlights from top leagues",
    amount: micro_stx(50_000),
    icon: "\u{1f3ac}",
    unlock: "Unlock Match Highlights Video",
};

/// Deep match analytics.
pub const ANALYTICS: PriceTier = PriceTier {
    endpoint: "/api/analytics/:matchId",
    name: "Deep Analytics",
    description: "Goals, bookings, tactics, and head-to-head stats",
    amount: micro_stx(30_000),
    icon: "\u{1f4ca}",
    unlock: "Unlock Deep Match Analytics",
};

/// AI-written match summary.
pub const AI_SUMMARY: PriceTier = PriceTier {
    endpoint: "/api/ai-summary/:matchId",
    name: "AI Match Summary",
    description: "AI-generated tactical analysis and insights",
    amount: micro_stx(20_000),
    icon: "\u{1f916}",
    unlock: "Unlock AI Match Summary",
};

/// Live stream watch session.
pub const STREAM_WATCH: PriceTier = PriceTier {
    endpoint: "/api/streams/:streamId/watch",
    name: "Live Stream Watch Pass",
    description: "Pay-per-watch stream access session",
    amount: micro_stx(80_000),
    icon: "\u{1f4fa}",
    unlock: "Unlock Live Stream Watch Session",
};

/// All tiers in display order.
pub const TIERS: [PriceTier; 4] = [HIGHLIGHTS, ANALYTICS, AI_SUMMARY, STREAM_WATCH];

/// One entry of the pricing listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierListing {
    #[serde(flatten)]
    tier: PriceTier,
    price_formatted: String,
}

impl From<PriceTier> for TierListing {
    fn from(tier: PriceTier) -> Self {
        Self {
            price_formatted: tier.formatted(),
            tier,
        }
    }
}

/// Body of `GET /api/pricing`.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    /// Always `STX`.
    pub currency: &'static str,
    /// Short network name.
    pub network: &'static str,
    /// Every tier.
    pub tiers: Vec<TierListing>,
}

impl PricingResponse {
    /// Listing for `network`.
    #[must_use]
    pub fn new(network: StacksNetwork) -> Self {
        Self {
            currency: CURRENCY,
            network: network.name(),
            tiers: TIERS.into_iter().map(TierListing::from).collect(),
        }
    }
}
