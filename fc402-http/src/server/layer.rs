//! Axum middleware for enforcing payments on protected routes.
//!
//! Create one [`X402Middleware`] per application, then call
//! [`X402Middleware::with_price_tag`] for each priced route:
//!
//! ```ignore
//! let x402 = X402Middleware::new().with_facilitator_url(DEFAULT_FACILITATOR_URL);
//! let requirements = PaymentRequirements::exact(
//!     StacksNetwork::Testnet.chain_id(),
//!     MicroAmount::new(80_000).unwrap(),
//!     "STX",
//!     "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
//! );
//! let app = Router::new().route(
//!     "/api/streams/{id}/watch",
//!     get(watch).layer(x402.with_price_tag(requirements).with_description("Unlock Live Stream")),
//! );
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use fc402::{PaymentChallenge, PaymentRequirements};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use url::Url;

use super::paygate::{Paygate, ResourceInfoBuilder};
use super::verifier::{PresenceVerifier, ProofVerifier};

/// The main middleware instance for enforcing payments on routes.
pub struct X402Middleware<V = PresenceVerifier> {
    verifier: Arc<V>,
    base_url: Option<Url>,
    facilitator_url: Option<Arc<str>>,
}

impl<V> Clone for X402Middleware<V> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            base_url: self.base_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for X402Middleware<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Middleware")
            .field("verifier", &self.verifier)
            .field("base_url", &self.base_url)
            .field("facilitator_url", &self.facilitator_url)
            .finish()
    }
}

impl Default for X402Middleware<PresenceVerifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl X402Middleware<PresenceVerifier> {
    /// Creates a middleware that accepts any well-formed proof.
    #[must_use]
    pub fn new() -> Self {
        Self {
            verifier: Arc::new(PresenceVerifier),
            base_url: None,
            facilitator_url: None,
        }
    }
}

impl<V> X402Middleware<V> {
    /// Returns a reference to the proof verifier.
    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Replaces the proof verifier.
    #[must_use]
    pub fn with_verifier<W: ProofVerifier>(&self, verifier: W) -> X402Middleware<W> {
        X402Middleware {
            verifier: Arc::new(verifier),
            base_url: self.base_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
        }
    }

    /// Sets the origin used to construct resource URLs.
    ///
    /// Each request's path and query are joined to it. Without one, the origin
    /// comes from the request's `x-forwarded-proto` and `host` headers.
    #[must_use]
    pub fn with_base_url(&self, base_url: Url) -> Self {
        let mut this = self.clone();
        this.base_url = Some(base_url);
        this
    }

    /// Sets the facilitator URL advertised to legacy clients.
    #[must_use]
    pub fn with_facilitator_url(&self, facilitator_url: impl Into<String>) -> Self {
        let mut this = self.clone();
        this.facilitator_url = Some(Arc::from(facilitator_url.into()));
        this
    }

    /// Sets the requirements for a protected route.
    ///
    /// Returns a layer builder that accepts further options and resource details.
    #[must_use]
    pub fn with_price_tag(&self, requirements: PaymentRequirements) -> X402LayerBuilder<V> {
        X402LayerBuilder {
            verifier: Arc::clone(&self.verifier),
            base_url: self.base_url.clone().map(Arc::new),
            facilitator_url: self.facilitator_url.clone(),
            accepts: Arc::new(vec![requirements]),
            resource: Arc::new(ResourceInfoBuilder::default()),
        }
    }
}

/// Builder for configuring the payment layer of one route.
#[allow(missing_debug_implementations)]
pub struct X402LayerBuilder<V> {
    verifier: Arc<V>,
    base_url: Option<Arc<Url>>,
    facilitator_url: Option<Arc<str>>,
    accepts: Arc<Vec<PaymentRequirements>>,
    resource: Arc<ResourceInfoBuilder>,
}

impl<V> Clone for X402LayerBuilder<V> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            base_url: self.base_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
            accepts: Arc::clone(&self.accepts),
            resource: Arc::clone(&self.resource),
        }
    }
}

impl<V> X402LayerBuilder<V> {
    /// Adds another accepted payment option.
    ///
    /// Options are offered in the order they were added; the first is preferred.
    #[must_use]
    pub fn with_price_tag(mut self, requirements: PaymentRequirements) -> Self {
        let mut accepts = (*self.accepts).clone();
        accepts.push(requirements);
        self.accepts = Arc::new(accepts);
        self
    }

    /// Sets a description of what the payment grants access to.
    ///
    /// Also used as the human-readable `message` of the 402 body.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let mut resource = (*self.resource).clone();
        resource.description = description.into();
        self.resource = Arc::new(resource);
        self
    }

    /// Sets the MIME type of the protected resource.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        let mut resource = (*self.resource).clone();
        resource.mime_type = Some(mime.into());
        self.resource = Arc::new(resource);
        self
    }

    /// Pins the full URL of the protected resource.
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn with_resource(mut self, resource: Url) -> Self {
        let mut builder = (*self.resource).clone();
        builder.url = Some(resource.to_string());
        self.resource = Arc::new(builder);
        self
    }
}

impl<S, V> Layer<S> for X402LayerBuilder<V>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    V: ProofVerifier + 'static,
{
    type Service = X402MiddlewareService<V>;

    fn layer(&self, inner: S) -> Self::Service {
        X402MiddlewareService {
            verifier: Arc::clone(&self.verifier),
            base_url: self.base_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
            accepts: Arc::clone(&self.accepts),
            resource: Arc::clone(&self.resource),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Axum service that enforces payments on incoming requests.
#[allow(missing_debug_implementations)]
pub struct X402MiddlewareService<V> {
    verifier: Arc<V>,
    base_url: Option<Arc<Url>>,
    facilitator_url: Option<Arc<str>>,
    accepts: Arc<Vec<PaymentRequirements>>,
    resource: Arc<ResourceInfoBuilder>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<V> Clone for X402MiddlewareService<V> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            base_url: self.base_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
            accepts: Arc::clone(&self.accepts),
            resource: Arc::clone(&self.resource),
            inner: self.inner.clone(),
        }
    }
}

impl<V> Service<Request> for X402MiddlewareService<V>
where
    V: ProofVerifier + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    /// Builds a fresh challenge for the request and runs it through the gate.
    fn call(&mut self, req: Request) -> Self::Future {
        let verifier = Arc::clone(&self.verifier);
        let base_url = self.base_url.clone();
        let facilitator_url = self.facilitator_url.clone();
        let accepts = Arc::clone(&self.accepts);
        let resource_builder = Arc::clone(&self.resource);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let resource = resource_builder.as_resource_info(base_url.as_deref(), &req);

            // No configured options means nothing to charge for
            let Ok(challenge) = PaymentChallenge::new(resource, accepts.to_vec()) else {
                return inner.call(req).await;
            };

            let gate = Paygate {
                verifier,
                challenge,
                facilitator_url,
            };
            gate.handle_request(inner, req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
        X_FACILITATOR_URL_HEADER, X_PAYMENT_AMOUNT_HEADER, X_PAYMENT_HEADER,
        X_PAYMENT_NETWORK_HEADER, X_PAYMENT_REQUIRED_HEADER, X_PAYMENT_RESPONSE_HEADER,
    };
    use crate::headers::{
        XPaymentRequired, decode_payment_required, decode_payment_response,
        decode_x_payment_required,
    };
    use crate::server::{OfferedRequirementsVerifier, PaymentContext};
    use axum::body::{Body, to_bytes};
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use fc402::{MicroAmount, StacksNetwork};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const PAY_TO: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    fn requirements(amount: u64) -> PaymentRequirements {
        PaymentRequirements::exact(
            StacksNetwork::Testnet.chain_id(),
            MicroAmount::new(amount).unwrap(),
            "STX",
            PAY_TO,
        )
    }

    async fn protected(payment: Option<Extension<PaymentContext>>) -> Json<Value> {
        let payer = payment.and_then(|Extension(context)| context.payer);
        Json(json!({ "content": "protected", "payer": payer }))
    }

    fn app<V: ProofVerifier + 'static>(x402: &X402Middleware<V>) -> Router {
        Router::new().route(
            "/resource",
            get(protected).layer(
                x402.with_price_tag(requirements(80_000))
                    .with_description("Unlock Live Stream Watch Session"),
            ),
        )
    }

    fn get_request(headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder()
            .uri("/resource")
            .header("host", "127.0.0.1:3001");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unpaid_request_gets_challenge() {
        let x402 = X402Middleware::new().with_facilitator_url("https://facilitator.stacksx402.com");
        let response = app(&x402).oneshot(get_request(&[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let headers = response.headers().clone();
        let challenge = decode_payment_required(
            headers[PAYMENT_REQUIRED_HEADER].to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(challenge.accepts[0], requirements(80_000));
        assert_eq!(challenge.resource.url, "http://127.0.0.1:3001/resource");
        assert!(challenge.error.is_none());

        assert_eq!(headers[X_PAYMENT_AMOUNT_HEADER], "80000");
        assert_eq!(headers[X_PAYMENT_NETWORK_HEADER], "testnet");
        assert_eq!(
            headers[X_FACILITATOR_URL_HEADER],
            "https://facilitator.stacksx402.com"
        );
        let XPaymentRequired::Requirements(legacy) =
            decode_x_payment_required(headers[X_PAYMENT_REQUIRED_HEADER].to_str().unwrap())
                .unwrap()
        else {
            panic!("expected flattened requirements");
        };
        assert_eq!(legacy.amount(), Some(challenge.accepts[0].amount));

        let body = body_json(response).await;
        assert_eq!(body["x402Version"], 2);
        assert_eq!(body["accepts"][0]["amount"], "80000");
        assert_eq!(body["error"], "Payment Required");
        assert_eq!(body["message"], "Unlock Live Stream Watch Session");
        assert_eq!(body["requirements"]["amount"], "80000");
        assert_eq!(body["requirements"]["payTo"], PAY_TO);
    }

    #[tokio::test]
    async fn any_non_empty_proof_passes() {
        let x402 = X402Middleware::new();
        for header in [PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER] {
            let response = app(&x402)
                .oneshot(get_request(&[(header, "not-even-base64")]))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let ack = decode_payment_response(
                response.headers()[PAYMENT_RESPONSE_HEADER].to_str().unwrap(),
            )
            .unwrap();
            assert!(ack.ok);
            assert_eq!(ack.network, StacksNetwork::Testnet.chain_id());
            assert!(response.headers().contains_key(X_PAYMENT_RESPONSE_HEADER));
            assert_eq!(body_json(response).await["content"], "protected");
        }
    }

    #[tokio::test]
    async fn blank_proof_is_treated_as_absent() {
        let x402 = X402Middleware::new();
        let response = app(&x402)
            .oneshot(get_request(&[(PAYMENT_SIGNATURE_HEADER, "   ")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn payer_reaches_the_handler() {
        let x402 = X402Middleware::new();
        let preflight = app(&x402).oneshot(get_request(&[])).await.unwrap();
        let challenge = decode_payment_required(
            preflight.headers()[PAYMENT_REQUIRED_HEADER].to_str().unwrap(),
        )
        .unwrap();
        let proof = challenge
            .answer(
                &challenge.accepts[0],
                json!({ "transaction": "00deadbeef", "payer": "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG" }),
            )
            .unwrap();
        let encoded = proof.encode().unwrap();

        let response = app(&x402)
            .oneshot(get_request(&[(PAYMENT_SIGNATURE_HEADER, encoded.as_str())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack = decode_payment_response(
            response.headers()[PAYMENT_RESPONSE_HEADER].to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(
            ack.payer.as_deref(),
            Some("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG")
        );
        assert_eq!(
            body_json(response).await["payer"],
            "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG"
        );
    }

    #[tokio::test]
    async fn refused_proof_gets_challenge_with_reason() {
        let x402 = X402Middleware::new().with_verifier(OfferedRequirementsVerifier);
        let response = app(&x402)
            .oneshot(get_request(&[(PAYMENT_SIGNATURE_HEADER, "opaque")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let challenge = decode_payment_required(
            response.headers()[PAYMENT_REQUIRED_HEADER].to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(
            challenge.error.as_deref(),
            Some("Invalid or malformed payment header")
        );
        assert_eq!(
            body_json(response).await["error"],
            "Invalid or malformed payment header"
        );
    }

    #[tokio::test]
    async fn handler_errors_skip_acknowledgment() {
        let x402 = X402Middleware::new();
        let app = Router::new().route(
            "/resource",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE })
                .layer(x402.with_price_tag(requirements(20_000))),
        );
        let response = app
            .oneshot(get_request(&[(PAYMENT_SIGNATURE_HEADER, "proof")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.headers().contains_key(PAYMENT_RESPONSE_HEADER));
    }

    #[tokio::test]
    async fn base_url_and_extra_options() {
        let x402 = X402Middleware::new()
            .with_base_url(Url::parse("https://api.402fc.example").unwrap());
        let mainnet = PaymentRequirements::exact(
            StacksNetwork::Mainnet.chain_id(),
            MicroAmount::new(80_000).unwrap(),
            "STX",
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
        );
        let app = Router::new().route(
            "/resource",
            get(protected).layer(x402.with_price_tag(requirements(80_000)).with_price_tag(mainnet.clone())),
        );
        let response = app.oneshot(get_request(&[])).await.unwrap();
        let challenge = decode_payment_required(
            response.headers()[PAYMENT_REQUIRED_HEADER].to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(challenge.resource.url, "https://api.402fc.example/resource");
        assert_eq!(challenge.accepts.len(), 2);
        assert_eq!(challenge.accepts[1], mainnet);
    }
}
