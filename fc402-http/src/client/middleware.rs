//! The negotiator as a `reqwest-middleware` layer.

use std::sync::Arc;

use http::{Extensions, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument};

use super::decode::PaymentRequest;
use super::error::{Leg, NegotiationError};
use super::negotiator::{Negotiator, NegotiatorConfig};
use super::session::WalletSession;
use super::signer::PaymentSigner;

/// Pays for `402 Payment Required` responses on any request sent through a
/// [`rqm::ClientWithMiddleware`].
///
/// Follows the same rules as [`Negotiator::negotiate`]: one paid retry at
/// most, the proof under every proof header, and a per-leg timeout. Unlike the
/// negotiator it hands responses back untouched, so a second 402 or a 402
/// without a usable challenge reaches the caller as a plain response.
///
/// A request whose body is a stream cannot be sent twice. It fails with
/// [`NegotiationError::RequestNotCloneable`] before the wallet is asked to sign.
#[derive(Debug)]
pub struct X402Client<S> {
    negotiator: Negotiator<S>,
}

impl<S> X402Client<S> {
    /// Creates a client paying through `session`.
    #[must_use]
    pub fn new(session: Arc<WalletSession<S>>) -> Self {
        Self {
            negotiator: Negotiator::new(session),
        }
    }

    /// Replaces the negotiation settings.
    #[must_use]
    pub fn with_config(mut self, config: NegotiatorConfig) -> Self {
        self.negotiator = self.negotiator.with_config(config);
        self
    }

    /// The underlying negotiator.
    #[must_use]
    pub const fn negotiator(&self) -> &Negotiator<S> {
        &self.negotiator
    }
}

impl<S> From<Negotiator<S>> for X402Client<S> {
    fn from(negotiator: Negotiator<S>) -> Self {
        Self { negotiator }
    }
}

impl<S: PaymentSigner> X402Client<S> {
    async fn send(
        &self,
        next: rqm::Next<'_>,
        req: Request,
        extensions: &mut Extensions,
        leg: Leg,
    ) -> rqm::Result<Response> {
        let timeout = self.negotiator.config().timeout;
        let sent = tokio::time::timeout(timeout, run_next(next, req, extensions));
        match self.negotiator.cancellable(leg, sent).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(middleware_error(NegotiationError::Timeout {
                leg,
                after: timeout,
            })),
            Err(err) => Err(middleware_error(err)),
        }
    }
}

fn middleware_error(err: NegotiationError) -> rqm::Error {
    rqm::Error::Middleware(err.into())
}

/// Runs the next middleware or HTTP client with optional telemetry instrumentation.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "fc402.reqwest.next", skip_all)
)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

#[async_trait::async_trait]
impl<S> rqm::Middleware for X402Client<S>
where
    S: PaymentSigner + 'static,
{
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "fc402.reqwest.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let res = self
            .send(next.clone(), req, extensions, Leg::Preflight)
            .await?;
        if res.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(res);
        }

        #[cfg(feature = "telemetry")]
        info!(url = %res.url(), "Received 402 Payment Required, processing payment");

        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await?;
        let challenge = match PaymentRequest::from_parts(&headers, &body) {
            PaymentRequest::Challenge { challenge, .. } => challenge,
            PaymentRequest::Legacy { .. } => {
                #[cfg(feature = "telemetry")]
                debug!("No usable challenge in 402, returning it to the caller");
                let mut original = http::Response::new(body);
                *original.status_mut() = status;
                *original.headers_mut() = headers;
                return Ok(Response::from(original));
            }
        };

        let mut retry =
            retry_req.ok_or_else(|| middleware_error(NegotiationError::RequestNotCloneable))?;
        let proof_headers = self
            .negotiator
            .pay(&challenge)
            .await
            .map_err(middleware_error)?;
        retry.headers_mut().extend(proof_headers);
        self.send(next, retry, extensions, Leg::Retry).await
    }
}
