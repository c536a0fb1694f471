//! Client side of the handshake: the payment proof negotiator.
//!
//! A [`Negotiator`] fetches a priced resource through a [`ResourceFetcher`].
//! When the server answers `402 Payment Required` it decodes the challenge,
//! picks an option according to the caller's [`PaymentPreference`], has the
//! wallet behind a [`WalletSession`] sign it, and retries exactly once with the
//! proof attached.
//!
//! ```ignore
//! let session = Arc::new(WalletSession::new(my_wallet));
//! let negotiator = Negotiator::new(session);
//! let fetcher = HttpFetcher::new(reqwest::Client::new(), url);
//! match negotiator.negotiate(&fetcher).await? {
//!     Negotiated::Fetched { response, .. } => println!("{}", response.text()),
//!     Negotiated::LegacyRequired { message, .. } => println!("{message}"),
//! }
//! ```
//!
//! For code already built on `reqwest`, [`X402Client`] applies the same cycle as
//! a `reqwest-middleware` layer; see [`ReqwestWithPayments`].

mod decode;
pub mod error;
mod fetch;
mod middleware;
mod negotiator;
mod select;
mod session;
mod signer;

pub use decode::{ChallengeSource, PaymentRequest};
pub use error::{Leg, NegotiationError, SigningError, TransportError};
pub use fetch::{FetchResponse, HttpFetcher, ResourceFetcher};
pub use middleware::X402Client;
pub use negotiator::{DEFAULT_TIMEOUT, Negotiated, Negotiator, NegotiatorConfig, acknowledgment};
pub use select::PaymentPreference;
pub use session::WalletSession;
pub use signer::PaymentSigner;

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

/// Adds automatic payment handling to reqwest clients.
///
/// Implemented on [`Client`] and [`ClientBuilder`].
pub trait ReqwestWithPayments<A, S> {
    /// Wraps the client or builder with `x402_client`.
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<A, S>;
}

impl<S> ReqwestWithPayments<Self, S> for Client {
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

impl<S> ReqwestWithPayments<Self, S> for ClientBuilder {
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

/// Builder for a reqwest client with the payment middleware.
#[allow(missing_debug_implementations)] // generic A may not implement Debug
pub struct ReqwestWithPaymentsBuilder<A, S> {
    inner: A,
    x402_client: X402Client<S>,
}

/// Builds the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`build`](Self::build).
    type BuildResult;
    /// The type returned by [`builder`](Self::builder).
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the middleware client builder, for stacking more middleware.
    fn builder(self) -> Self::BuilderResult;
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client, S>
where
    X402Client<S>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.x402_client)
    }
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder, S>
where
    X402Client<S>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.x402_client))
    }
}
