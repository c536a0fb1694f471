//! HTTP-specific constants for the 402FC handshake.
//!
//! Header names are lowercase so they can be used with
//! `HeaderName::from_static`.

/// Primary header carrying the payment proof (client → server).
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";

/// Legacy alias for the payment proof.
pub const X_PAYMENT_HEADER: &str = "x-payment";

/// Second legacy alias for the payment proof.
pub const X_PAYMENT_SIGNATURE_HEADER: &str = "x-payment-signature";

/// Proof headers in the order the gate consults them.
pub const PROOF_HEADERS: [&str; 3] = [
    PAYMENT_SIGNATURE_HEADER,
    X_PAYMENT_HEADER,
    X_PAYMENT_SIGNATURE_HEADER,
];

/// Base64 JSON challenge (server → client).
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";

/// Plain JSON flattened requirements for clients that predate V2.
pub const X_PAYMENT_REQUIRED_HEADER: &str = "x-payment-required";

/// Base64 JSON acknowledgment after the gate passes a request.
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";

/// Plain JSON duplicate of the acknowledgment.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Legacy single-value header: amount in smallest units.
pub const X_PAYMENT_AMOUNT_HEADER: &str = "x-payment-amount";

/// Legacy single-value header: recipient address.
pub const X_PAYMENT_ADDRESS_HEADER: &str = "x-payment-address";

/// Legacy single-value header: short network name.
pub const X_PAYMENT_NETWORK_HEADER: &str = "x-payment-network";

/// Legacy single-value header: asset symbol.
pub const X_PAYMENT_ASSET_HEADER: &str = "x-payment-asset";

/// Legacy single-value header: facilitator URL.
pub const X_FACILITATOR_URL_HEADER: &str = "x-facilitator-url";

/// Response headers a browser client must be allowed to read.
pub const EXPOSED_HEADERS: [&str; 9] = [
    PAYMENT_REQUIRED_HEADER,
    PAYMENT_RESPONSE_HEADER,
    X_PAYMENT_REQUIRED_HEADER,
    X_FACILITATOR_URL_HEADER,
    X_PAYMENT_AMOUNT_HEADER,
    X_PAYMENT_ADDRESS_HEADER,
    X_PAYMENT_NETWORK_HEADER,
    X_PAYMENT_ASSET_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
];

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;

/// Default Stacks facilitator service URL.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.stacksx402.com";

/// Message used when a 402 carries no description of its own.
pub const DEFAULT_PAYMENT_MESSAGE: &str = "Payment required";
