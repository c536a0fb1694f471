//! Reads a 402 response into something the negotiator can act on.
//!
//! Locations are tried in a fixed order: the `payment-required` header, then the
//! `x-payment-required` header, then the JSON body. If none of them yields a
//! valid challenge, a flattened [`LegacyRequirements`] is assembled from
//! whatever the response does carry.

use fc402::{LegacyRequirements, PaymentChallenge};
use http::HeaderMap;
use serde_json::Value;

use crate::constants::{
    DEFAULT_PAYMENT_MESSAGE, PAYMENT_REQUIRED_HEADER, X_FACILITATOR_URL_HEADER,
    X_PAYMENT_ADDRESS_HEADER, X_PAYMENT_AMOUNT_HEADER, X_PAYMENT_ASSET_HEADER,
    X_PAYMENT_NETWORK_HEADER, X_PAYMENT_REQUIRED_HEADER,
};
use crate::headers::{XPaymentRequired, decode_payment_required, decode_x_payment_required};

/// Where a challenge was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeSource {
    /// Base64 JSON in `payment-required`.
    PrimaryHeader,
    /// JSON in `x-payment-required`.
    LegacyHeader,
    /// The response body.
    Body,
}

/// What a 402 response asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    /// A well-formed challenge the negotiator can answer.
    Challenge {
        /// The decoded challenge.
        challenge: PaymentChallenge,
        /// Where it was read from.
        source: ChallengeSource,
        /// Human-readable prompt.
        message: String,
    },
    /// No valid challenge; best-effort flattened requirements instead.
    Legacy {
        /// Recovered requirements, possibly partial.
        requirements: LegacyRequirements,
        /// Human-readable prompt.
        message: String,
    },
}

impl PaymentRequest {
    /// Decodes a 402 response from its headers and raw body.
    ///
    /// Never fails: an undecodable response yields [`PaymentRequest::Legacy`],
    /// possibly with empty requirements.
    #[must_use]
    pub fn from_parts(headers: &HeaderMap, body: &[u8]) -> Self {
        let body: Option<Value> = serde_json::from_slice(body).ok();
        let body_message = body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_owned);

        let primary = header_str(headers, PAYMENT_REQUIRED_HEADER)
            .and_then(|value| decode_payment_required(value).ok());
        if let Some(challenge) = primary {
            return Self::found(challenge, ChallengeSource::PrimaryHeader, body_message);
        }

        let mut legacy_header = None;
        match header_str(headers, X_PAYMENT_REQUIRED_HEADER)
            .and_then(|value| decode_x_payment_required(value).ok())
        {
            Some(XPaymentRequired::Challenge(challenge)) => {
                return Self::found(challenge, ChallengeSource::LegacyHeader, body_message);
            }
            Some(XPaymentRequired::Requirements(requirements)) => {
                legacy_header = Some(requirements);
            }
            None => {}
        }

        if let Some(challenge) = body
            .clone()
            .and_then(|body| PaymentChallenge::from_value(body).ok())
        {
            return Self::found(challenge, ChallengeSource::Body, body_message);
        }

        let requirements = body
            .and_then(|mut body| body.get_mut("requirements").map(Value::take))
            .and_then(|value| serde_json::from_value::<LegacyRequirements>(value).ok())
            .filter(|requirements| !requirements.is_empty())
            .or(legacy_header)
            .unwrap_or_else(|| from_loose_headers(headers));
        let message = body_message.unwrap_or_else(|| requirements.message());
        Self::Legacy {
            requirements,
            message,
        }
    }

    fn found(
        challenge: PaymentChallenge,
        source: ChallengeSource,
        message: Option<String>,
    ) -> Self {
        Self::Challenge {
            challenge,
            source,
            message: message.unwrap_or_else(|| DEFAULT_PAYMENT_MESSAGE.to_owned()),
        }
    }

    /// The decoded challenge, if there is one.
    #[must_use]
    pub const fn challenge(&self) -> Option<&PaymentChallenge> {
        match self {
            Self::Challenge { challenge, .. } => Some(challenge),
            Self::Legacy { .. } => None,
        }
    }

    /// Human-readable prompt for the user.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Challenge { message, .. } | Self::Legacy { message, .. } => message,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn from_loose_headers(headers: &HeaderMap) -> LegacyRequirements {
    let get = |name| header_str(headers, name).map(str::to_owned);
    let mut requirements = LegacyRequirements {
        amount: get(X_PAYMENT_AMOUNT_HEADER),
        pay_to: get(X_PAYMENT_ADDRESS_HEADER),
        network: get(X_PAYMENT_NETWORK_HEADER),
        facilitator_url: get(X_FACILITATOR_URL_HEADER),
        ..Default::default()
    };
    if let Some(asset) = get(X_PAYMENT_ASSET_HEADER) {
        requirements.asset = asset;
    }
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc402::{MicroAmount, PaymentRequirements, ResourceInfo, StacksNetwork};
    use http::HeaderValue;
    use serde_json::json;

    fn challenge() -> PaymentChallenge {
        PaymentChallenge::new(
            ResourceInfo::new("http://localhost:3001/api/streams/laliga-live-2/watch", "Watch"),
            vec![PaymentRequirements::exact(
                StacksNetwork::Testnet.chain_id(),
                MicroAmount::new(80_000).unwrap(),
                "STX",
                "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            )],
        )
        .unwrap()
    }

    fn header(headers: &mut HeaderMap, name: &'static str, value: &str) {
        headers.insert(name, HeaderValue::from_str(value).unwrap());
    }

    #[test]
    fn primary_header_wins() {
        let mut headers = HeaderMap::new();
        header(&mut headers, PAYMENT_REQUIRED_HEADER, &challenge().encode().unwrap());
        header(&mut headers, X_PAYMENT_REQUIRED_HEADER, "{\"amount\":\"1\"}");
        let body = json!({ "message": "Unlock Live Stream Watch Session" }).to_string();

        let request = PaymentRequest::from_parts(&headers, body.as_bytes());
        let PaymentRequest::Challenge { challenge: decoded, source, message } = request else {
            panic!("expected a challenge");
        };
        assert_eq!(decoded, challenge());
        assert_eq!(source, ChallengeSource::PrimaryHeader);
        assert_eq!(message, "Unlock Live Stream Watch Session");
    }

    #[test]
    fn falls_back_to_body() {
        let mut body = serde_json::to_value(challenge()).unwrap();
        body["requirements"] = json!({ "amount": "80000" });
        body["error"] = json!("Payment Required");
        let request = PaymentRequest::from_parts(&HeaderMap::new(), body.to_string().as_bytes());
        assert!(matches!(
            request,
            PaymentRequest::Challenge { source: ChallengeSource::Body, .. }
        ));
        assert_eq!(request.message(), DEFAULT_PAYMENT_MESSAGE);
    }

    #[test]
    fn invalid_primary_falls_through_to_legacy_header() {
        let mut headers = HeaderMap::new();
        header(&mut headers, PAYMENT_REQUIRED_HEADER, "not base64!");
        header(
            &mut headers,
            X_PAYMENT_REQUIRED_HEADER,
            &serde_json::to_string(&challenge()).unwrap(),
        );
        let request = PaymentRequest::from_parts(&headers, b"");
        assert!(matches!(
            request,
            PaymentRequest::Challenge { source: ChallengeSource::LegacyHeader, .. }
        ));
    }

    #[test]
    fn empty_accepts_yields_body_requirements() {
        let body = json!({
            "x402Version": 2,
            "resource": { "url": "http://localhost/x" },
            "accepts": [],
            "requirements": { "amount": "80000", "payTo": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM", "network": "testnet" }
        });
        let request = PaymentRequest::from_parts(&HeaderMap::new(), body.to_string().as_bytes());
        let PaymentRequest::Legacy { requirements, message } = request else {
            panic!("expected legacy requirements");
        };
        assert_eq!(requirements.amount.as_deref(), Some("80000"));
        assert_eq!(requirements.asset, "STX");
        assert_eq!(message, "Payment required: 0.08 STX");
    }

    #[test]
    fn loose_headers_are_the_last_resort() {
        let mut headers = HeaderMap::new();
        header(&mut headers, X_PAYMENT_AMOUNT_HEADER, "30000");
        header(&mut headers, X_PAYMENT_ADDRESS_HEADER, "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
        header(&mut headers, X_PAYMENT_NETWORK_HEADER, "mainnet");
        let request = PaymentRequest::from_parts(&headers, b"<html>402</html>");
        let PaymentRequest::Legacy { requirements, .. } = request else {
            panic!("expected legacy requirements");
        };
        assert_eq!(requirements.amount().map(MicroAmount::get), Some(30_000));
        assert_eq!(requirements.asset, "STX");
        assert_eq!(requirements.chain_id(), Some(StacksNetwork::Mainnet.chain_id()));
    }

    #[test]
    fn nothing_at_all() {
        let request = PaymentRequest::from_parts(&HeaderMap::new(), b"");
        assert!(request.challenge().is_none());
        assert_eq!(request.message(), DEFAULT_PAYMENT_MESSAGE);
    }
}
