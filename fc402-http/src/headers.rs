//! HTTP header encoding and decoding for 402FC protocol messages.
//!
//! The V2 headers (`payment-required`, `payment-signature`, `payment-response`)
//! carry base64 JSON. Their `x-` counterparts carry plain JSON for clients that
//! predate V2, except the proof aliases which repeat the base64 value.

use fc402::proto::{Base64Bytes, decode_json};
use fc402::{LegacyRequirements, PaymentAcknowledgment, PaymentChallenge, PaymentProof};
use serde_json::Value;

use crate::error::HttpError;

/// Encodes a challenge for the `payment-required` header.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] if JSON serialization fails.
pub fn encode_payment_required(challenge: &PaymentChallenge) -> Result<String, HttpError> {
    Ok(challenge.encode()?)
}

/// Decodes a `payment-required` header value into a well-formed challenge.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] on base64/JSON failure or an empty `accepts`.
pub fn decode_payment_required(header_value: &str) -> Result<PaymentChallenge, HttpError> {
    Ok(PaymentChallenge::decode(header_value.as_bytes())?)
}

/// Encodes flattened requirements as plain JSON for `x-payment-required`.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_x_payment_required(requirements: &LegacyRequirements) -> Result<String, HttpError> {
    Ok(serde_json::to_string(requirements)?)
}

/// What an `x-payment-required` header turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPaymentRequired {
    /// A full V2 challenge, from a server that duplicates it into the legacy header.
    Challenge(PaymentChallenge),
    /// Flattened requirements.
    Requirements(LegacyRequirements),
}

/// Decodes an `x-payment-required` header value.
///
/// Servers disagree on this header: some send base64 JSON, most send plain JSON,
/// and the JSON is either a V2 challenge or a flattened requirements object.
/// All four combinations are accepted.
///
/// # Errors
///
/// Returns [`HttpError`] if the value is neither base64 JSON nor plain JSON, or
/// if the JSON is neither shape.
pub fn decode_x_payment_required(header_value: &str) -> Result<XPaymentRequired, HttpError> {
    let value = decode_json::<Value>(header_value.as_bytes())
        .or_else(|_| serde_json::from_str::<Value>(header_value.trim()))?;
    if let Ok(challenge) = PaymentChallenge::from_value(value.clone()) {
        return Ok(XPaymentRequired::Challenge(challenge));
    }
    Ok(XPaymentRequired::Requirements(serde_json::from_value(value)?))
}

/// Encodes a proof for the `payment-signature` header and its aliases.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] if JSON serialization fails.
pub fn encode_payment_signature(proof: &PaymentProof) -> Result<String, HttpError> {
    Ok(proof.encode()?)
}

/// Decodes a `payment-signature` header value into a V2 proof.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] on base64/JSON failure.
pub fn decode_payment_signature(header_value: &str) -> Result<PaymentProof, HttpError> {
    Ok(PaymentProof::decode(header_value.as_bytes())?)
}

/// Best-effort payer extraction from any proof header value.
///
/// Understands V2 proofs (`payload.payer`, `payload.from`, `payload.sender`) and
/// the older demo proof, a base64 JSON object with a top-level `from`.
#[must_use]
pub fn decode_proof_payer(header_value: &str) -> Option<String> {
    let bytes = Base64Bytes::from(header_value.as_bytes()).decode().ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    if let Ok(proof) = serde_json::from_value::<PaymentProof>(value.clone()) {
        return proof.payer().map(str::to_owned);
    }
    value.get("from").and_then(Value::as_str).map(str::to_owned)
}

/// Encodes an acknowledgment for the `payment-response` header.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] if JSON serialization fails.
pub fn encode_payment_response(ack: &PaymentAcknowledgment) -> Result<String, HttpError> {
    Ok(ack.encode()?)
}

/// Encodes an acknowledgment as plain JSON for `x-payment-response`.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_x_payment_response(ack: &PaymentAcknowledgment) -> Result<String, HttpError> {
    Ok(serde_json::to_string(ack)?)
}

/// Decodes a `payment-response` header value.
///
/// # Errors
///
/// Returns [`HttpError::Protocol`] on base64/JSON failure.
pub fn decode_payment_response(header_value: &str) -> Result<PaymentAcknowledgment, HttpError> {
    Ok(PaymentAcknowledgment::decode(header_value.as_bytes())?)
}

/// Decodes a plain JSON `x-payment-response` header value.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] on malformed JSON.
pub fn decode_x_payment_response(header_value: &str) -> Result<PaymentAcknowledgment, HttpError> {
    Ok(serde_json::from_str(header_value.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc402::proto::encode_json;
    use fc402::{MicroAmount, PaymentRequirements, ResourceInfo, StacksNetwork};
    use serde_json::json;

    fn challenge() -> PaymentChallenge {
        PaymentChallenge::new(
            ResourceInfo::new("http://localhost:3001/api/streams/ucl-night-feed/watch", "Watch"),
            vec![PaymentRequirements::exact(
                StacksNetwork::Testnet.chain_id(),
                MicroAmount::new(80_000).unwrap(),
                "STX",
                "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            )],
        )
        .unwrap()
    }

    #[test]
    fn legacy_header_agrees_with_primary_on_amount() {
        let challenge = challenge();
        let primary = encode_payment_required(&challenge).unwrap();
        let legacy = encode_x_payment_required(
            &challenge.preferred().unwrap().to_legacy(Some("Watch"), None),
        )
        .unwrap();

        let from_primary = decode_payment_required(&primary).unwrap();
        let XPaymentRequired::Requirements(from_legacy) = decode_x_payment_required(&legacy).unwrap()
        else {
            panic!("expected flattened requirements");
        };
        assert_eq!(
            from_legacy.amount(),
            Some(from_primary.preferred().unwrap().amount)
        );
    }

    #[test]
    fn legacy_header_may_carry_a_challenge() {
        let challenge = challenge();
        let plain = serde_json::to_string(&challenge).unwrap();
        let encoded = encode_payment_required(&challenge).unwrap();
        for value in [plain, encoded] {
            assert_eq!(
                decode_x_payment_required(&value).unwrap(),
                XPaymentRequired::Challenge(challenge.clone())
            );
        }
    }

    #[test]
    fn legacy_header_rejects_garbage() {
        assert!(decode_x_payment_required("definitely not json").is_err());
    }

    #[test]
    fn payer_from_v2_and_demo_proofs() {
        let challenge = challenge();
        let proof = challenge
            .answer(
                challenge.preferred().unwrap(),
                json!({ "transaction": "00", "payer": "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG" }),
            )
            .unwrap();
        let encoded = encode_payment_signature(&proof).unwrap();
        assert_eq!(
            decode_proof_payer(&encoded).as_deref(),
            Some("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG")
        );

        let demo = encode_json(&json!({
            "from": "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG",
            "to": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "amount": "80000",
        }))
        .unwrap();
        assert_eq!(
            decode_proof_payer(&demo).as_deref(),
            Some("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG")
        );

        assert_eq!(decode_proof_payer("opaque-token"), None);
    }

    #[test]
    fn acknowledgment_in_both_encodings() {
        let ack = PaymentAcknowledgment::accepted(StacksNetwork::Testnet.chain_id(), None);
        let b64 = encode_payment_response(&ack).unwrap();
        let plain = encode_x_payment_response(&ack).unwrap();
        assert_eq!(decode_payment_response(&b64).unwrap(), ack);
        assert_eq!(decode_x_payment_response(&plain).unwrap(), ack);
    }
}
