//! The resource-fetch seam the negotiator drives.

use std::borrow::Cow;
use std::future::Future;

use http::{HeaderMap, StatusCode};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use super::error::TransportError;

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Returns `true` for `402 Payment Required`.
    #[must_use]
    pub fn is_payment_required(&self) -> bool {
        self.status == StatusCode::PAYMENT_REQUIRED
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// An idempotent request for a priced resource.
///
/// Called once without a proof and, after a 402, once more with the proof
/// headers. Implementations must send the same request both times.
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Sends the request with `proof_headers` added.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response was received.
    async fn fetch(&self, proof_headers: &HeaderMap) -> Result<FetchResponse, TransportError>;
}

#[async_trait::async_trait]
impl<F, Fut> ResourceFetcher for F
where
    F: Fn(HeaderMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchResponse, TransportError>> + Send + 'static,
{
    async fn fetch(&self, proof_headers: &HeaderMap) -> Result<FetchResponse, TransportError> {
        self(proof_headers.clone()).await
    }
}

/// `GET` on a fixed URL through a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    url: Url,
    headers: HeaderMap,
}

impl HttpFetcher {
    /// Creates a fetcher for `url` using `client`.
    #[must_use]
    pub fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Adds headers sent on every leg, e.g. `accept` or an API key.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// The URL being fetched.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, proof_headers: &HeaderMap) -> Result<FetchResponse, TransportError> {
        let mut headers = self.headers.clone();
        headers.extend(proof_headers.clone());
        let response = self
            .client
            .get(self.url.clone())
            .headers(headers)
            .send()
            .await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
