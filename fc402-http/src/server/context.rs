//! The proof a request arrived with, as seen by the gate.

use fc402::PaymentProof;
use http::HeaderMap;

use crate::constants::PROOF_HEADERS;
use crate::headers::{decode_payment_signature, decode_proof_payer};

/// Payment details attached to a request that passed the gate.
///
/// Inserted as a request extension; handlers read it with
/// `Option<Extension<PaymentContext>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
    /// Name of the header the proof was taken from.
    pub header: &'static str,
    /// The proof exactly as sent, minus surrounding whitespace.
    pub raw_proof: String,
    /// The decoded V2 proof, when the header holds one.
    pub proof: Option<PaymentProof>,
    /// Payer address, when the proof names one.
    pub payer: Option<String>,
}

impl PaymentContext {
    /// Picks the proof from `headers`, honouring [`PROOF_HEADERS`] priority.
    ///
    /// Malformed values (empty after trimming, or containing anything other than
    /// visible ASCII and spaces) are skipped as if the header were absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        PROOF_HEADERS.iter().find_map(|&name| {
            let value = headers.get(name)?;
            let raw = well_formed(value.as_bytes())?;
            Some(Self::parse(name, raw))
        })
    }

    /// Decodes what it can from a raw proof value.
    #[must_use]
    pub fn parse(header: &'static str, raw: &str) -> Self {
        Self {
            header,
            raw_proof: raw.to_owned(),
            proof: decode_payment_signature(raw).ok(),
            payer: decode_proof_payer(raw),
        }
    }
}

fn well_formed(bytes: &[u8]) -> Option<&str> {
    let trimmed = bytes.trim_ascii();
    if trimmed.is_empty() || !trimmed.iter().all(|b| (0x20..=0x7e).contains(b)) {
        return None;
    }
    std::str::from_utf8(trimmed).ok()
}
