//! Amounts denominated in the smallest unit of the payment asset.
//!
//! Prices travel on the wire as integer strings (`"80000"`) so that JSON
//! parsers without 64-bit integers keep full precision. For display they are
//! scaled by [`MICRO_DECIMALS`], so 80000 micro-STX renders as `0.08 STX`.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimals between the smallest unit and the whole asset.
pub const MICRO_DECIMALS: u32 = 6;

/// A strictly positive amount in smallest units (e.g. micro-STX).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MicroAmount(NonZeroU64);

/// Error returned when an amount string is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount must be a positive integer in smallest units, got {0:?}")]
pub struct InvalidAmount(pub String);

impl MicroAmount {
    /// Creates an amount, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the raw amount in smallest units.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the amount in whole units of the asset.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.get()), MICRO_DECIMALS).normalize()
    }

    /// Formats the amount with its asset symbol, e.g. `0.08 STX`.
    #[must_use]
    pub fn display_with(self, asset: &str) -> String {
        format!("{} {asset}", self.to_decimal())
    }
}

impl fmt::Display for MicroAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MicroAmount {
    type Err = InvalidAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount(s.to_owned()));
        }
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidAmount(s.to_owned()))
    }
}

impl From<MicroAmount> for u64 {
    fn from(value: MicroAmount) -> Self {
        value.get()
    }
}

impl Serialize for MicroAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MicroAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
