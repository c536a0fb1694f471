//! V2 payment messages.
//!
//! These types use CAIP-2 network identifiers and amounts in smallest units.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::encoding::{decode_json, encode_json};
use super::version::{V2, X402Version2};
use super::{LegacyRequirements, ProtocolError};
use crate::amount::MicroAmount;
use crate::chain::{ChainId, StacksNetwork};

/// Scheme identifier for "pay exactly this amount" payments.
pub const EXACT_SCHEME: &str = "exact";

/// Default upper bound, in seconds, for settling a payment.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Describes the resource being purchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Absolute URL of the resource.
    pub url: String,

    /// Human-readable description of what the payment unlocks.
    #[serde(default)]
    pub description: String,

    /// Optional MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    /// Creates a resource descriptor without a MIME type.
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            mime_type: None,
        }
    }
}

/// One acceptable way to pay for a resource.
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "stacks:2147483648",
///   "amount": "80000",
///   "asset": "STX",
///   "payTo": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
///   "maxTimeoutSeconds": 300
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g. `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier (e.g. `"stacks:1"`).
    pub network: ChainId,

    /// Amount in smallest units of `asset`.
    pub amount: MicroAmount,

    /// Asset symbol (e.g. `"STX"`).
    pub asset: String,

    /// Recipient address.
    pub pay_to: String,

    /// Advisory upper bound on how long settlement may take.
    pub max_timeout_seconds: u64,

    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Requirements for the `exact` scheme with the default timeout.
    pub fn exact(
        network: ChainId,
        amount: MicroAmount,
        asset: impl Into<String>,
        pay_to: impl Into<String>,
    ) -> Self {
        Self {
            scheme: EXACT_SCHEME.to_owned(),
            network,
            amount,
            asset: asset.into(),
            pay_to: pay_to.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            extra: None,
        }
    }

    /// Overrides the settlement timeout.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// The Stacks network these requirements settle on, if any.
    #[must_use]
    pub fn stacks_network(&self) -> Option<StacksNetwork> {
        StacksNetwork::from_chain_id(&self.network)
    }

    /// Short network name for legacy clients: `mainnet`/`testnet` on Stacks,
    /// the CAIP-2 string elsewhere.
    #[must_use]
    pub fn network_name(&self) -> String {
        self.stacks_network()
            .map_or_else(|| self.network.to_string(), |n| n.name().to_owned())
    }

    /// Flattens these requirements for clients that do not understand V2.
    #[must_use]
    pub fn to_legacy(
        &self,
        description: Option<&str>,
        facilitator_url: Option<&str>,
    ) -> LegacyRequirements {
        LegacyRequirements {
            amount: Some(self.amount.to_string()),
            asset: self.asset.clone(),
            pay_to: Some(self.pay_to.clone()),
            network: Some(self.network_name()),
            facilitator_url: facilitator_url.map(str::to_owned),
            description: description.map(str::to_owned),
        }
    }
}

/// The full 402 payload: what is being sold and every accepted way to pay.
///
/// A challenge is well-formed only when `accepts` is non-empty; the first entry
/// is the server's preferred option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,

    /// Why a previous proof was refused, if one was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// What is being purchased.
    pub resource: ResourceInfo,

    /// Accepted payment options, preferred first.
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentChallenge {
    /// Builds a challenge, rejecting an empty option list.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyAccepts`] if `accepts` is empty.
    pub fn new(
        resource: ResourceInfo,
        accepts: Vec<PaymentRequirements>,
    ) -> Result<Self, ProtocolError> {
        let challenge = Self {
            x402_version: V2,
            error: None,
            resource,
            accepts,
        };
        challenge.validate()?;
        Ok(challenge)
    }

    /// Attaches a refusal reason.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyAccepts`] if no options are offered.
    pub const fn validate(&self) -> Result<(), ProtocolError> {
        if self.accepts.is_empty() {
            return Err(ProtocolError::EmptyAccepts);
        }
        Ok(())
    }

    /// The server's preferred option.
    #[must_use]
    pub fn preferred(&self) -> Option<&PaymentRequirements> {
        self.accepts.first()
    }

    /// Returns `true` if `requirements` is one of the offered options.
    #[must_use]
    pub fn offers(&self, requirements: &PaymentRequirements) -> bool {
        self.accepts.iter().any(|offered| offered == requirements)
    }

    /// Parses and validates a challenge from an arbitrary JSON document.
    ///
    /// Unknown fields (such as the `message` of a 402 body) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the document is not a well-formed V2 challenge.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let challenge: Self = serde_json::from_value(value)?;
        challenge.validate()?;
        Ok(challenge)
    }

    /// Encodes the challenge as base64 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_json(self)
    }

    /// Decodes and validates a base64 JSON challenge.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on malformed input or an empty option list.
    pub fn decode(encoded: &[u8]) -> Result<Self, ProtocolError> {
        let challenge: Self = decode_json(encoded)?;
        challenge.validate()?;
        Ok(challenge)
    }

    /// Builds the proof answering this challenge with `accepted`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AcceptedNotOffered`] if `accepted` is not one of
    /// the offered options.
    pub fn answer(
        &self,
        accepted: &PaymentRequirements,
        payload: Value,
    ) -> Result<PaymentProof, ProtocolError> {
        if !self.offers(accepted) {
            return Err(ProtocolError::AcceptedNotOffered);
        }
        Ok(PaymentProof {
            x402_version: self.x402_version,
            resource: Some(self.resource.clone()),
            accepted: accepted.clone(),
            payload,
        })
    }
}

/// Evidence that the client paid for one of a challenge's options.
///
/// # JSON Format
///
/// ```json
/// {
///   "x402Version": 2,
///   "resource": { "url": "http://localhost:3001/api/streams/x/watch", "description": "..." },
///   "accepted": { "scheme": "exact", "network": "stacks:2147483648", ... },
///   "payload": { "transaction": "00deadbeef" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    /// Protocol version; matches the challenge being answered.
    pub x402_version: X402Version2,

    /// Echo of the challenge's resource descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// The option the client chose to satisfy.
    pub accepted: PaymentRequirements,

    /// Mechanism-specific evidence, e.g. a signed transaction.
    pub payload: Value,
}

impl PaymentProof {
    /// Builds a proof with no challenge to echo, for requirements recovered
    /// from a 402 that carried only the flattened form.
    #[must_use]
    pub const fn new(accepted: PaymentRequirements, payload: Value) -> Self {
        Self {
            x402_version: V2,
            resource: None,
            accepted,
            payload,
        }
    }

    /// Encodes the proof as base64 JSON for the `payment-signature` header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_json(self)
    }

    /// Decodes a base64 JSON proof.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on malformed input.
    pub fn decode(encoded: &[u8]) -> Result<Self, ProtocolError> {
        decode_json(encoded)
    }

    /// Payer address claimed by the payload, if any.
    #[must_use]
    pub fn payer(&self) -> Option<&str> {
        ["payer", "from", "sender"]
            .iter()
            .find_map(|key| self.payload.get(key).and_then(Value::as_str))
    }
}

/// Receipt the gate attaches to a response once a proof has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAcknowledgment {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,

    /// Whether the payment was accepted.
    pub ok: bool,

    /// Network the payment was made on.
    pub network: ChainId,

    /// Payer address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl PaymentAcknowledgment {
    /// An acknowledgment for an accepted payment.
    #[must_use]
    pub const fn accepted(network: ChainId, payer: Option<String>) -> Self {
        Self {
            x402_version: V2,
            ok: true,
            network,
            payer,
        }
    }

    /// Encodes the acknowledgment as base64 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_json(self)
    }

    /// Decodes a base64 JSON acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on malformed input.
    pub fn decode(encoded: &[u8]) -> Result<Self, ProtocolError> {
        decode_json(encoded)
    }
}
