//! CAIP-2 chain identifiers and the Stacks networks payments settle on.
//!
//! A [CAIP-2](https://standards.chainagnostic.org/CAIPs/caip-2) chain ID is a
//! `namespace:reference` pair. Stacks mainnet is `stacks:1`, testnet is
//! `stacks:2147483648`.
//!
//! ```
//! use fc402::chain::{ChainId, StacksNetwork};
//!
//! let testnet: ChainId = "stacks:2147483648".parse().unwrap();
//! assert_eq!(StacksNetwork::from_chain_id(&testnet), Some(StacksNetwork::Testnet));
//! assert_eq!(StacksNetwork::resolve("MAINNET").chain_id().to_string(), "stacks:1");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// CAIP-2 namespace used by every Stacks network.
pub const STACKS_NAMESPACE: &str = "stacks";

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to and from the colon-separated string form, e.g. `"stacks:1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    /// The blockchain namespace (e.g. `stacks`).
    pub namespace: String,
    /// The chain-specific reference (e.g. `1` for Stacks mainnet).
    pub reference: String,
}

impl ChainId {
    /// Creates a new chain ID from namespace and reference components.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Returns the namespace component of the chain ID.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component of the chain ID.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID string.
///
/// Both the namespace and the reference must be non-empty.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(Self::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.into())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// The Stacks networks a payment can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StacksNetwork {
    /// Stacks mainnet, `stacks:1`.
    Mainnet,
    /// Stacks testnet, `stacks:2147483648`.
    #[default]
    Testnet,
}

impl StacksNetwork {
    /// Short human-readable name used by legacy clients.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    /// CAIP-2 reference for this network.
    #[must_use]
    pub const fn reference(self) -> &'static str {
        match self {
            Self::Mainnet => "1",
            Self::Testnet => "2147483648",
        }
    }

    /// CAIP-2 chain ID for this network.
    #[must_use]
    pub fn chain_id(self) -> ChainId {
        ChainId::new(STACKS_NAMESPACE, self.reference())
    }

    /// Maps a chain ID back to a Stacks network, if it is one.
    #[must_use]
    pub fn from_chain_id(chain_id: &ChainId) -> Option<Self> {
        if chain_id.namespace != STACKS_NAMESPACE {
            return None;
        }
        [Self::Mainnet, Self::Testnet]
            .into_iter()
            .find(|network| network.reference() == chain_id.reference)
    }

    /// Resolves configuration text into a network.
    ///
    /// Accepts `mainnet`, `testnet` or the CAIP-2 form, case-insensitively.
    /// Anything else, including an empty string, resolves to testnet.
    #[must_use]
    pub fn resolve(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized == Self::Mainnet.name() || normalized == Self::Mainnet.chain_id().to_string()
        {
            Self::Mainnet
        } else {
            Self::Testnet
        }
    }

    /// Address prefix of single-signature accounts on this network.
    #[must_use]
    pub const fn address_prefix(self) -> &'static str {
        match self {
            Self::Mainnet => "SP",
            Self::Testnet => "ST",
        }
    }
}

impl fmt::Display for StacksNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^S[PT][A-Z0-9]{20,}$").unwrap()
});

/// A normalised Stacks account address (`SP…` on mainnet, `ST…` on testnet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StacksAddress(String);

impl StacksAddress {
    /// Trims and upper-cases `value`, returning `None` unless it looks like a
    /// Stacks address.
    #[must_use]
    pub fn normalize(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        ADDRESS_PATTERN
            .is_match(&normalized)
            .then_some(Self(normalized))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Network implied by the address prefix.
    #[must_use]
    pub fn network(&self) -> StacksNetwork {
        if self.0.starts_with(StacksNetwork::Mainnet.address_prefix()) {
            StacksNetwork::Mainnet
        } else {
            StacksNetwork::Testnet
        }
    }

    /// Shortened form for display, e.g. `ST1PQH...GZGM`.
    #[must_use]
    pub fn truncated(&self) -> String {
        let head = &self.0[..6];
        let tail = &self.0[self.0.len() - 4..];
        format!("{head}...{tail}")
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StacksAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::normalize(&s).ok_or_else(|| de::Error::custom(format!("invalid Stacks address {s}")))
    }
}
