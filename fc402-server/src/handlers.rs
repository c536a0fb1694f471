//! Axum route handlers for the demo API.
//!
//! | Route | Price |
//! |---|---|
//! | `GET /api/health` | free |
//! | `GET /api/pricing` | free |
//! | `GET /api/streams` | free |
//! | `GET /api/streams/{stream_id}/watch` | 0.08 STX |

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use fc402::chain::{ChainId, StacksAddress};
use fc402::StacksNetwork;
use fc402_http::server::{PaymentContext, X402Middleware};
use serde::Serialize;
use url::Url;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::pricing::{PricingResponse, STREAM_WATCH};
use crate::streams::{CatalogResponse, Stream, WatchSession, find_stream, iso8601, is_valid_stream_id};

/// Settings the handlers read.
#[derive(Debug, Clone)]
pub struct ApiContext {
    /// Network payments settle on.
    pub network: StacksNetwork,
    /// Recipient of payments.
    pub pay_to: StacksAddress,
    /// Facilitator advertised to legacy clients.
    pub facilitator_url: String,
    /// Public origin for challenge resource URLs.
    pub public_base_url: Option<Url>,
}

/// Shared application state.
pub type ApiState = Arc<ApiContext>;

impl ApiContext {
    /// State derived from the server configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> ApiState {
        Arc::new(Self {
            network: config.network,
            pay_to: config.pay_to.clone(),
            facilitator_url: config.facilitator_url.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }

    fn payment_gate(&self) -> X402Middleware {
        let gate = X402Middleware::new().with_facilitator_url(self.facilitator_url.clone());
        match &self.public_base_url {
            Some(base_url) => gate.with_base_url(base_url.clone()),
            None => gate,
        }
    }
}

/// Builds the API router.
///
/// The watch route checks the stream id and looks the stream up before the
/// payment gate runs, so unknown streams get a plain `404` and never a
/// challenge.
pub fn api_router(state: ApiState) -> Router {
    let watch = get(get_stream_watch)
        .layer(
            state
                .payment_gate()
                .with_price_tag(STREAM_WATCH.requirements(state.network, &state.pay_to))
                .with_description(STREAM_WATCH.unlock)
                .with_mime_type("application/json"),
        )
        .layer(middleware::from_fn(resolve_stream));

    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/pricing", get(get_pricing))
        .route("/api/streams", get(get_streams))
        .route("/api/streams/{stream_id}/watch", watch)
        .with_state(state)
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
    network: &'static str,
    #[serde(rename = "networkCAIP2")]
    network_caip2: ChainId,
    timestamp: String,
}

/// `GET /api/health`
pub async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: "402FC API",
        version: "1.0.0",
        network: state.network.name(),
        network_caip2: state.network.chain_id(),
        timestamp: iso8601(Utc::now()),
    })
}

/// `GET /api/pricing`
pub async fn get_pricing(State(state): State<ApiState>) -> Json<PricingResponse> {
    Json(PricingResponse::new(state.network))
}

/// `GET /api/streams` returns catalog metadata, never playback URLs.
pub async fn get_streams(State(state): State<ApiState>) -> Json<CatalogResponse> {
    Json(CatalogResponse::new(state.network.name(), &STREAM_WATCH))
}

/// Validates the `{stream_id}` segment and attaches the catalog entry.
///
/// # Errors
///
/// [`ApiError::InvalidStreamId`] for ids outside `[a-z0-9-]`,
/// [`ApiError::StreamNotFound`] for ids not in the catalog.
pub async fn resolve_stream(
    Path(stream_id): Path<String>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_valid_stream_id(&stream_id) {
        return Err(ApiError::InvalidStreamId);
    }
    let stream = find_stream(&stream_id).ok_or(ApiError::StreamNotFound)?;
    req.extensions_mut().insert(stream);
    Ok(next.run(req).await)
}

/// `GET /api/streams/{stream_id}/watch`, reached only with a payment proof.
pub async fn get_stream_watch(
    Extension(stream): Extension<&'static Stream>,
    payment: Option<Extension<PaymentContext>>,
) -> Json<WatchSession> {
    let paid_by = payment.and_then(|Extension(payment)| payment.payer);
    tracing::info!(stream = stream.id, paid_by = ?paid_by, "Watch session issued");
    Json(WatchSession::issue(stream, paid_by, Utc::now()))
}
