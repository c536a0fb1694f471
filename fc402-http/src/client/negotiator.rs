//! The preflight, sign, retry cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fc402::{
    LegacyRequirements, PaymentAcknowledgment, PaymentChallenge, PaymentProof, PaymentRequirements,
    ProtocolError, StacksNetwork,
};
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument};

use super::decode::PaymentRequest;
use super::error::{Leg, NegotiationError};
use super::fetch::{FetchResponse, ResourceFetcher};
use super::select::PaymentPreference;
use super::session::WalletSession;
use super::signer::PaymentSigner;
use crate::constants::{PAYMENT_RESPONSE_HEADER, PROOF_HEADERS, X_PAYMENT_RESPONSE_HEADER};
use crate::error::HttpError;
use crate::headers::{decode_payment_response, decode_x_payment_response, encode_payment_signature};

/// Time budget of each HTTP leg unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Tuning for a [`Negotiator`].
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Budget for the preflight and for the retry, each on its own.
    pub timeout: Duration,
    /// Which offered option to pay.
    pub preference: PaymentPreference,
    /// Aborts whichever leg is in flight when cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            preference: PaymentPreference::default(),
            cancellation: None,
        }
    }
}

impl NegotiatorConfig {
    /// Sets the per-leg timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the payment preference.
    #[must_use]
    pub fn with_preference(mut self, preference: PaymentPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Result of a negotiation that did not fail.
#[derive(Debug, Clone)]
pub enum Negotiated {
    /// The final response: the preflight itself when it was not a 402,
    /// otherwise the paid retry.
    Fetched {
        /// The response.
        response: FetchResponse,
        /// Receipt from `payment-response`, when the server sent one.
        acknowledgment: Option<PaymentAcknowledgment>,
    },
    /// The 402 carried no usable challenge. Nothing was signed or retried;
    /// [`Negotiator::negotiate_legacy`] pays with the recovered requirements.
    LegacyRequired {
        /// Best-effort requirements recovered from the response.
        requirements: LegacyRequirements,
        /// Human-readable prompt.
        message: String,
    },
}

/// Drives one priced fetch through the payment handshake.
///
/// Issues at most two requests per [`negotiate`](Self::negotiate) call. The
/// wallet is reached through a shared [`WalletSession`].
#[derive(Debug)]
pub struct Negotiator<S> {
    session: Arc<WalletSession<S>>,
    config: NegotiatorConfig,
}

impl<S> Clone for Negotiator<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            config: self.config.clone(),
        }
    }
}

impl<S> Negotiator<S> {
    /// Creates a negotiator with the default configuration.
    #[must_use]
    pub fn new(session: Arc<WalletSession<S>>) -> Self {
        Self {
            session,
            config: NegotiatorConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: NegotiatorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// The wallet session.
    #[must_use]
    pub const fn session(&self) -> &Arc<WalletSession<S>> {
        &self.session
    }
}

impl<S: PaymentSigner> Negotiator<S> {
    /// Fetches a resource, paying for it if the server answers 402.
    ///
    /// # Errors
    ///
    /// - [`NegotiationError::Network`], [`NegotiationError::Timeout`] or
    ///   [`NegotiationError::Cancelled`] if either leg does not complete
    /// - [`NegotiationError::SigningFailed`] if the wallet produces no payload
    /// - [`NegotiationError::PaymentDeclined`] if the paid retry gets another 402
    /// - [`NegotiationError::UpstreamUnavailable`] if the paid retry gets a 5xx
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "fc402.negotiate", skip_all, err)
    )]
    pub async fn negotiate<F>(&self, fetcher: &F) -> Result<Negotiated, NegotiationError>
    where
        F: ResourceFetcher + ?Sized,
    {
        let preflight = self
            .fetch_leg(fetcher, &HeaderMap::new(), Leg::Preflight)
            .await?;
        if !preflight.is_payment_required() {
            return Ok(fetched(preflight));
        }

        let challenge = match PaymentRequest::from_parts(&preflight.headers, &preflight.body) {
            PaymentRequest::Challenge { challenge, .. } => challenge,
            PaymentRequest::Legacy {
                requirements,
                message,
            } => {
                #[cfg(feature = "telemetry")]
                debug!("402 carried no usable challenge, surfacing legacy requirements");
                return Ok(Negotiated::LegacyRequired {
                    requirements,
                    message,
                });
            }
        };

        let proof_headers = self.pay(&challenge).await?;
        self.retry(fetcher, &proof_headers).await
    }

    /// Pays with requirements recovered from a 402 that had no usable
    /// challenge, then retries once.
    ///
    /// Takes the `requirements` of [`Negotiated::LegacyRequired`]. The proof
    /// carries no resource echo.
    ///
    /// # Errors
    ///
    /// As [`negotiate`](Self::negotiate), plus
    /// [`NegotiationError::IncompleteRequirements`] when there is no amount or
    /// recipient to pay.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "fc402.negotiate_legacy", skip_all, err)
    )]
    pub async fn negotiate_legacy<F>(
        &self,
        fetcher: &F,
        requirements: &LegacyRequirements,
    ) -> Result<Negotiated, NegotiationError>
    where
        F: ResourceFetcher + ?Sized,
    {
        let proof_headers = self.pay_legacy(requirements).await?;
        self.retry(fetcher, &proof_headers).await
    }

    /// Signs the preferred option of `challenge` and returns the proof under
    /// every proof header name.
    ///
    /// Signing has no time budget but honours the cancellation token.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::SigningFailed`] or
    /// [`NegotiationError::Cancelled`] from the wallet step, or
    /// [`NegotiationError::Encode`] if the proof cannot be encoded.
    pub async fn pay(&self, challenge: &PaymentChallenge) -> Result<HeaderMap, NegotiationError> {
        let accepted = self
            .config
            .preference
            .select(challenge)
            .ok_or(HttpError::Protocol(ProtocolError::EmptyAccepts))?;

        #[cfg(feature = "telemetry")]
        debug!(
            network = %accepted.network,
            amount = %accepted.amount,
            asset = %accepted.asset,
            "Selected payment option"
        );

        let payload = self.sign(accepted).await?;
        let proof = challenge
            .answer(accepted, payload)
            .map_err(HttpError::from)?;
        proof_headers(&proof)
    }

    /// Signs flattened requirements and returns the proof under every proof
    /// header name.
    ///
    /// A missing network falls back to the preferred one, then to testnet.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::IncompleteRequirements`] before reaching
    /// the wallet, otherwise the same errors as [`pay`](Self::pay).
    pub async fn pay_legacy(
        &self,
        requirements: &LegacyRequirements,
    ) -> Result<HeaderMap, NegotiationError> {
        let fallback = self
            .config
            .preference
            .network
            .clone()
            .unwrap_or_else(|| StacksNetwork::Testnet.chain_id());
        let accepted = requirements
            .to_requirements(&fallback)
            .ok_or(NegotiationError::IncompleteRequirements)?;
        let payload = self.sign(&accepted).await?;
        proof_headers(&PaymentProof::new(accepted, payload))
    }

    async fn sign(&self, accepted: &PaymentRequirements) -> Result<Value, NegotiationError> {
        self.cancellable(Leg::Signing, self.session.sign(accepted))
            .await?
            .map_err(NegotiationError::SigningFailed)
    }

    async fn retry<F>(
        &self,
        fetcher: &F,
        proof_headers: &HeaderMap,
    ) -> Result<Negotiated, NegotiationError>
    where
        F: ResourceFetcher + ?Sized,
    {
        let retry = self.fetch_leg(fetcher, proof_headers, Leg::Retry).await?;
        if retry.is_payment_required() {
            return Err(declined(&retry));
        }
        if retry.status.is_server_error() {
            return Err(upstream_unavailable(&retry));
        }

        #[cfg(feature = "telemetry")]
        info!(status = %retry.status, "Paid request completed");
        Ok(fetched(retry))
    }

    async fn fetch_leg<F>(
        &self,
        fetcher: &F,
        headers: &HeaderMap,
        leg: Leg,
    ) -> Result<FetchResponse, NegotiationError>
    where
        F: ResourceFetcher + ?Sized,
    {
        let timeout = self.config.timeout;
        match self
            .cancellable(leg, tokio::time::timeout(timeout, fetcher.fetch(headers)))
            .await?
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(NegotiationError::Network { leg, source }),
            Err(_) => Err(NegotiationError::Timeout {
                leg,
                after: timeout,
            }),
        }
    }

    pub(super) async fn cancellable<T>(
        &self,
        leg: Leg,
        future: impl Future<Output = T>,
    ) -> Result<T, NegotiationError> {
        let Some(token) = &self.config.cancellation else {
            return Ok(future.await);
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(NegotiationError::Cancelled { leg }),
            output = future => Ok(output),
        }
    }
}

fn proof_headers(proof: &PaymentProof) -> Result<HeaderMap, NegotiationError> {
    let value =
        HeaderValue::try_from(encode_payment_signature(proof)?).map_err(HttpError::from)?;
    let mut headers = HeaderMap::new();
    for name in PROOF_HEADERS {
        headers.insert(HeaderName::from_static(name), value.clone());
    }
    Ok(headers)
}

fn fetched(response: FetchResponse) -> Negotiated {
    Negotiated::Fetched {
        acknowledgment: acknowledgment(&response.headers),
        response,
    }
}

fn declined(response: &FetchResponse) -> NegotiationError {
    match PaymentRequest::from_parts(&response.headers, &response.body) {
        PaymentRequest::Challenge {
            challenge, message, ..
        } => NegotiationError::PaymentDeclined {
            message: challenge.error.clone().unwrap_or(message),
            challenge: Some(Box::new(challenge)),
        },
        PaymentRequest::Legacy { message, .. } => NegotiationError::PaymentDeclined {
            challenge: None,
            message,
        },
    }
}

fn upstream_unavailable(response: &FetchResponse) -> NegotiationError {
    let message = response
        .json::<Value>()
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
        .or_else(|| response.status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| "Upstream unavailable".to_owned());
    NegotiationError::UpstreamUnavailable {
        status: response.status,
        message,
    }
}

/// Reads the server's receipt from the response headers, if present.
#[must_use]
pub fn acknowledgment(headers: &HeaderMap) -> Option<PaymentAcknowledgment> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    header(PAYMENT_RESPONSE_HEADER)
        .and_then(|value| decode_payment_response(value).ok())
        .or_else(|| {
            header(X_PAYMENT_RESPONSE_HEADER).and_then(|value| decode_x_payment_response(value).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fc402::chain::StacksAddress;
    use fc402::{MicroAmount, ResourceInfo};
    use http::StatusCode;
    use reqwest::Client;
    use serde_json::{Value, json};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::error::{SigningError, TransportError};
    use crate::client::fetch::HttpFetcher;
    use crate::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER};
    use crate::headers::encode_payment_response;

    const PAYER: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";
    const WATCH: &str = "/api/streams/laliga-live-2/watch";

    #[derive(Default)]
    struct TestWallet {
        failure: Option<SigningError>,
        stall: bool,
        signs: AtomicUsize,
    }

    impl TestWallet {
        fn failing(failure: SigningError) -> Self {
            Self {
                failure: Some(failure),
                ..Self::default()
            }
        }

        fn stalling() -> Self {
            Self {
                stall: true,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentSigner for TestWallet {
        async fn connect(&self) -> Result<String, SigningError> {
            Ok(PAYER.to_owned())
        }

        async fn sign(
            &self,
            requirements: &PaymentRequirements,
            payer: &StacksAddress,
        ) -> Result<Value, SigningError> {
            self.signs.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            if !requirements.asset.eq_ignore_ascii_case("STX") {
                return Err(SigningError::UnsupportedAsset(requirements.asset.clone()));
            }
            Ok(json!({ "transaction": "00aa", "from": payer }))
        }
    }

    fn negotiator_with(wallet: TestWallet) -> Negotiator<TestWallet> {
        Negotiator::new(Arc::new(WalletSession::new(wallet)))
    }

    fn negotiator() -> Negotiator<TestWallet> {
        negotiator_with(TestWallet::default())
    }

    fn signs(negotiator: &Negotiator<TestWallet>) -> usize {
        negotiator.session().signer().signs.load(Ordering::SeqCst)
    }

    fn challenge(server: &MockServer) -> PaymentChallenge {
        PaymentChallenge::new(
            ResourceInfo::new(format!("{}{WATCH}", server.uri()), "Unlock Live Stream Watch Session"),
            vec![PaymentRequirements::exact(
                StacksNetwork::Testnet.chain_id(),
                MicroAmount::new(80_000).unwrap(),
                "STX",
                "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            )],
        )
        .unwrap()
    }

    fn payment_required(challenge: &PaymentChallenge) -> ResponseTemplate {
        ResponseTemplate::new(402)
            .insert_header(PAYMENT_REQUIRED_HEADER, challenge.encode().unwrap().as_str())
            .set_body_json(json!({ "message": "Unlock Live Stream Watch Session" }))
    }

    fn fetcher(server: &MockServer) -> HttpFetcher {
        HttpFetcher::new(Client::new(), format!("{}{WATCH}", server.uri()).parse().unwrap())
    }

    #[tokio::test]
    async fn non_402_is_returned_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Stream not found" })))
            .expect(1)
            .mount(&server)
            .await;

        let negotiator = negotiator();
        let outcome = negotiator.negotiate(&fetcher(&server)).await.unwrap();
        let Negotiated::Fetched { response, acknowledgment } = outcome else {
            panic!("expected a fetched response");
        };
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>().unwrap()["error"], "Stream not found");
        assert!(acknowledgment.is_none());
        assert_eq!(signs(&negotiator), 0);
    }

    #[tokio::test]
    async fn pays_and_retries_once() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        let ack = PaymentAcknowledgment::accepted(StacksNetwork::Testnet.chain_id(), Some(PAYER.into()));
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .and(header_exists(X_PAYMENT_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(PAYMENT_RESPONSE_HEADER, encode_payment_response(&ack).unwrap().as_str())
                    .set_body_json(json!({ "streamId": "laliga-live-2" })),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let negotiator = negotiator();
        let outcome = negotiator.negotiate(&fetcher(&server)).await.unwrap();
        let Negotiated::Fetched { response, acknowledgment } = outcome else {
            panic!("expected a fetched response");
        };
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(acknowledgment, Some(ack));
        assert_eq!(signs(&negotiator), 1);

        let requests = server.received_requests().await.unwrap();
        let paid = requests.last().unwrap();
        let proof = PaymentProof::decode(paid.headers[PAYMENT_SIGNATURE_HEADER].as_bytes()).unwrap();
        assert_eq!(proof.accepted, challenge.accepts[0]);
        assert_eq!(proof.payer(), Some(PAYER));
        assert_eq!(proof.resource, Some(challenge.resource));
    }

    #[tokio::test]
    async fn second_402_is_a_decline() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        let refused = challenge.clone().with_error("settlement failed");
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(payment_required(&refused))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let err = negotiator().negotiate(&fetcher(&server)).await.unwrap_err();
        let NegotiationError::PaymentDeclined { challenge, message } = err else {
            panic!("expected a decline");
        };
        assert_eq!(message, "settlement failed");
        assert_eq!(challenge.map(|challenge| *challenge), Some(refused));
    }

    #[tokio::test]
    async fn undecodable_challenge_surfaces_legacy_requirements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": "Payment Required",
                "requirements": {
                    "amount": "80000",
                    "payTo": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
                    "network": "testnet"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let negotiator = negotiator();
        let outcome = negotiator.negotiate(&fetcher(&server)).await.unwrap();
        let Negotiated::LegacyRequired { requirements, message } = outcome else {
            panic!("expected legacy requirements");
        };
        assert_eq!(requirements.amount.as_deref(), Some("80000"));
        assert_eq!(message, "Payment required: 0.08 STX");
        assert_eq!(signs(&negotiator), 0);
    }

    #[tokio::test]
    async fn signing_failure_skips_the_retry() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let err = negotiator_with(TestWallet::failing(SigningError::Cancelled)).negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::SigningFailed(SigningError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn slow_leg_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let negotiator = negotiator()
            .with_config(NegotiatorConfig::default().with_timeout(Duration::from_millis(50)));
        let err = negotiator.negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Timeout { leg: Leg::Preflight, after } if after == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn cancelled_token_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let negotiator =
            negotiator().with_config(NegotiatorConfig::default().with_cancellation(token));
        let err = negotiator.negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(err, NegotiationError::Cancelled { leg: Leg::Preflight }));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        let fetcher = HttpFetcher::new(Client::new(), "http://127.0.0.1:1/".parse().unwrap());
        let err = negotiator().negotiate(&fetcher).await.unwrap_err();
        assert!(matches!(err, NegotiationError::Network { leg: Leg::Preflight, .. }));
    }

    #[tokio::test]
    async fn unsupported_asset_is_a_signing_failure() {
        let server = MockServer::start().await;
        let mut challenge = challenge(&server);
        challenge.accepts[0].asset = "sBTC".into();
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let err = negotiator().negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::SigningFailed(SigningError::UnsupportedAsset(asset)) if asset == "sBTC"
        ));
    }

    #[tokio::test]
    async fn wallet_failure_is_reported_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge(&server)))
            .expect(1)
            .mount(&server)
            .await;

        let unavailable = SigningError::Wallet("signer is unavailable for x402 v2 payments".into());
        let err = negotiator_with(TestWallet::failing(unavailable.clone()))
            .negotiate(&fetcher(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::SigningFailed(failure) if failure == unavailable));
    }

    #[tokio::test]
    async fn retry_leg_has_its_own_budget() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let budget = Duration::from_millis(300);
        let negotiator = negotiator().with_config(NegotiatorConfig::default().with_timeout(budget));
        let err = negotiator.negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Timeout { leg: Leg::Retry, after } if after == budget
        ));
        assert_eq!(signs(&negotiator), 1);
    }

    #[tokio::test]
    async fn cancelling_while_the_wallet_is_open_skips_the_retry() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let negotiator = negotiator_with(TestWallet::stalling())
            .with_config(NegotiatorConfig::default().with_cancellation(token));
        let err = negotiator.negotiate(&fetcher(&server)).await.unwrap_err();
        assert!(matches!(err, NegotiationError::Cancelled { leg: Leg::Signing }));
        assert_eq!(signs(&negotiator), 1);
    }

    #[tokio::test]
    async fn server_error_after_payment_is_upstream_unavailable() {
        let server = MockServer::start().await;
        let challenge = challenge(&server);
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(json!({ "error": "Sports data provider unavailable" })),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(payment_required(&challenge))
            .expect(1)
            .mount(&server)
            .await;

        let err = negotiator().negotiate(&fetcher(&server)).await.unwrap_err();
        let NegotiationError::UpstreamUnavailable { status, message } = err else {
            panic!("expected upstream unavailable");
        };
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "Sports data provider unavailable");
    }

    #[tokio::test]
    async fn legacy_requirements_can_still_be_paid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .and(header_exists(X_PAYMENT_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WATCH))
            .respond_with(
                ResponseTemplate::new(402)
                    .insert_header("x-payment-amount", "80000")
                    .insert_header("x-payment-address", "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
                    .insert_header("x-payment-network", "testnet"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let negotiator = negotiator();
        let fetcher = fetcher(&server);
        let outcome = negotiator.negotiate(&fetcher).await.unwrap();
        let Negotiated::LegacyRequired { requirements, .. } = outcome else {
            panic!("expected legacy requirements");
        };
        let outcome = negotiator.negotiate_legacy(&fetcher, &requirements).await.unwrap();
        let Negotiated::Fetched { response, .. } = outcome else {
            panic!("expected a fetched response");
        };
        assert_eq!(response.status, StatusCode::OK);

        let requests = server.received_requests().await.unwrap();
        let paid = requests.last().unwrap();
        let proof = PaymentProof::decode(paid.headers[PAYMENT_SIGNATURE_HEADER].as_bytes()).unwrap();
        assert!(proof.resource.is_none());
        assert_eq!(proof.accepted.amount.get(), 80_000);
        assert_eq!(proof.accepted.network, StacksNetwork::Testnet.chain_id());
        assert_eq!(proof.payer(), Some(PAYER));
    }

    #[tokio::test]
    async fn incomplete_legacy_requirements_never_reach_the_wallet() {
        let fetcher = |_headers: HeaderMap| async {
            let unreachable: Box<dyn std::error::Error + Send + Sync> = "unreachable".into();
            Err::<FetchResponse, _>(TransportError::from(unreachable))
        };
        let requirements = LegacyRequirements {
            amount: Some("20000".into()),
            ..LegacyRequirements::default()
        };
        let negotiator = negotiator();
        let err = negotiator.negotiate_legacy(&fetcher, &requirements).await.unwrap_err();
        assert!(matches!(err, NegotiationError::IncompleteRequirements));
        assert_eq!(signs(&negotiator), 0);
    }
}
