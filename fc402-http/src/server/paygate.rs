//! Core payment gate logic.
//!
//! The [`Paygate`] struct handles one request: it looks for a proof header, asks
//! the verifier about it, and either passes the request through or answers with
//! `402 Payment Required`.

use std::convert::Infallible;
use std::sync::Arc;

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use fc402::{ChainId, PaymentAcknowledgment, PaymentChallenge, ResourceInfo};
use http::header::{CONTENT_TYPE, HOST};
use http::uri::{Authority, PathAndQuery};
use http::{HeaderMap, HeaderValue, StatusCode, Uri};
use serde_json::{Value, json};
use tower::Service;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::Instrument;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::context::PaymentContext;
use super::error::PaygateError;
use super::verifier::ProofVerifier;
use crate::constants::{
    DEFAULT_PAYMENT_MESSAGE, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER,
    X_FACILITATOR_URL_HEADER, X_PAYMENT_ADDRESS_HEADER, X_PAYMENT_AMOUNT_HEADER,
    X_PAYMENT_ASSET_HEADER, X_PAYMENT_NETWORK_HEADER, X_PAYMENT_REQUIRED_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
};
use crate::headers::{
    encode_payment_required, encode_payment_response, encode_x_payment_required,
    encode_x_payment_response,
};

/// Header consulted for the original scheme behind a TLS-terminating proxy.
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// `error` value of a 402 body when no proof was refused.
const PAYMENT_REQUIRED_ERROR: &str = "Payment Required";

/// Builder for the resource descriptor embedded in each challenge.
#[derive(Debug, Clone, Default)]
pub struct ResourceInfoBuilder {
    /// Description of the protected resource
    pub description: String,
    /// MIME type of the protected resource
    pub mime_type: Option<String>,
    /// Optional explicit URL of the protected resource
    pub url: Option<String>,
}

impl ResourceInfoBuilder {
    /// Determines the resource URL (static or per request).
    ///
    /// An explicit `url` wins. Otherwise the request path and query are joined to
    /// `base_url`, or, without one, to an origin built from `x-forwarded-proto`
    /// and `host` (falling back to `http://localhost`).
    pub fn as_resource_info<B>(
        &self,
        base_url: Option<&Url>,
        req: &http::Request<B>,
    ) -> ResourceInfo {
        let url = self
            .url
            .clone()
            .unwrap_or_else(|| request_url(base_url, req.headers(), req.uri()));
        ResourceInfo {
            url,
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

fn request_url(base_url: Option<&Url>, headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(base_url) = base_url {
        let mut url = base_url.clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        return url.to_string();
    }
    let scheme = headers
        .get(FORWARDED_PROTO_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .or_else(|| uri.authority().map(Authority::as_str))
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);
    format!("{scheme}://{host}{path_and_query}")
}

/// Payment gate for a single request.
///
/// Holds the challenge an unpaid request would receive; it is built fresh per
/// request and never stored.
#[allow(missing_debug_implementations)]
pub struct Paygate<V> {
    /// Decides whether a submitted proof is acceptable
    pub verifier: V,
    /// Challenge issued when payment is missing or refused
    pub challenge: PaymentChallenge,
    /// Facilitator advertised to legacy clients
    pub facilitator_url: Option<Arc<str>>,
}

impl<V> Paygate<V> {
    /// Calls the inner service with proper telemetry instrumentation.
    async fn call_inner<ReqBody, S>(
        mut inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<S::Response, S::Error>
    where
        S: Service<http::Request<ReqBody>>,
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        {
            inner
                .call(req)
                .instrument(tracing::info_span!("inner"))
                .await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            inner.call(req).await
        }
    }

    /// Builds the `402 Payment Required` response for `err`.
    ///
    /// Headers that cannot be encoded are left out rather than failing the
    /// response.
    #[must_use]
    pub fn payment_required_response(&self, err: &PaygateError) -> Response {
        let reason = err.reason();
        let mut challenge = self.challenge.clone();
        if let Some(reason) = &reason {
            challenge = challenge.with_error(reason.clone());
        }
        let description =
            Some(challenge.resource.description.as_str()).filter(|text| !text.is_empty());
        let message = description.unwrap_or(DEFAULT_PAYMENT_MESSAGE).to_owned();
        let legacy = challenge
            .preferred()
            .map(|requirements| requirements.to_legacy(description, self.facilitator_url.as_deref()));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(encoded) = encode_payment_required(&challenge) {
            insert_header(&mut headers, PAYMENT_REQUIRED_HEADER, &encoded);
        }
        if let Some(legacy) = &legacy {
            if let Ok(plain) = encode_x_payment_required(legacy) {
                insert_header(&mut headers, X_PAYMENT_REQUIRED_HEADER, &plain);
            }
            let singles = [
                (X_PAYMENT_AMOUNT_HEADER, legacy.amount.as_deref()),
                (X_PAYMENT_ADDRESS_HEADER, legacy.pay_to.as_deref()),
                (X_PAYMENT_NETWORK_HEADER, legacy.network.as_deref()),
                (X_PAYMENT_ASSET_HEADER, Some(legacy.asset.as_str())),
                (X_FACILITATOR_URL_HEADER, legacy.facilitator_url.as_deref()),
            ];
            for (name, value) in singles {
                if let Some(value) = value {
                    insert_header(&mut headers, name, value);
                }
            }
        }

        let mut body = serde_json::to_value(&challenge).unwrap_or_else(|_| json!({}));
        if let Value::Object(fields) = &mut body {
            fields.insert("message".into(), Value::String(message));
            fields.insert(
                "error".into(),
                Value::String(reason.unwrap_or_else(|| PAYMENT_REQUIRED_ERROR.to_owned())),
            );
            fields.insert(
                "requirements".into(),
                serde_json::to_value(&legacy).unwrap_or(Value::Null),
            );
        }

        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = StatusCode::PAYMENT_REQUIRED;
        *response.headers_mut() = headers;
        response
    }

    fn acknowledgment(&self, context: &PaymentContext) -> Option<PaymentAcknowledgment> {
        let network: Option<&ChainId> = context
            .proof
            .as_ref()
            .map(|proof| &proof.accepted.network)
            .or_else(|| self.challenge.preferred().map(|requirements| &requirements.network));
        network.map(|network| PaymentAcknowledgment::accepted(network.clone(), context.payer.clone()))
    }
}

impl<V> Paygate<V>
where
    V: ProofVerifier,
{
    /// Handles an incoming request, enforcing payment.
    ///
    /// Returns a 402 response if payment is missing or refused; otherwise the
    /// response of the inner service, with acknowledgment headers added when it
    /// succeeded.
    ///
    /// # Errors
    ///
    /// This method is infallible (`Infallible` error type).
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "fc402.handle_request", skip_all, fields(resource = %self.challenge.resource.url))
    )]
    pub async fn handle_request<ReqBody, S>(
        self,
        inner: S,
        mut req: http::Request<ReqBody>,
    ) -> Result<Response, Infallible>
    where
        S: Service<http::Request<ReqBody>>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let context = match self.authorize(req.headers()).await {
            Ok(context) => context,
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(error = %err, "Issuing payment challenge");
                return Ok(self.payment_required_response(&err));
            }
        };

        #[cfg(feature = "telemetry")]
        tracing::info!(header = context.header, payer = ?context.payer, "Payment proof accepted");

        let acknowledgment = self.acknowledgment(&context);
        req.extensions_mut().insert(context);

        let mut response = match Self::call_inner(inner, req).await {
            Ok(response) => response.into_response(),
            Err(err) => return Ok(err.into_response()),
        };

        if response.status().is_client_error() || response.status().is_server_error() {
            return Ok(response);
        }

        if let Some(acknowledgment) = acknowledgment {
            let headers = response.headers_mut();
            if let Ok(encoded) = encode_payment_response(&acknowledgment) {
                insert_header(headers, PAYMENT_RESPONSE_HEADER, &encoded);
            }
            if let Ok(plain) = encode_x_payment_response(&acknowledgment) {
                insert_header(headers, X_PAYMENT_RESPONSE_HEADER, &plain);
            }
        }
        Ok(response)
    }

    /// Finds a well-formed proof in `headers` and runs it past the verifier.
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError::PaymentRequired`] when no usable proof header is
    /// present, or [`PaygateError::Verification`] when the verifier refuses it.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<PaymentContext, PaygateError> {
        let context = PaymentContext::from_headers(headers).ok_or(PaygateError::PaymentRequired)?;
        self.verifier.verify(&context, &self.challenge).await?;
        Ok(context)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    let Ok(value) = HeaderValue::from_str(value) else {
        #[cfg(feature = "telemetry")]
        tracing::warn!(header = name, "Dropping header value that is not visible ASCII");
        return;
    };
    headers.insert(name, value);
}
