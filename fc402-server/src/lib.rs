//! 402FC pay-per-view demo API.
//!
//! Serves a small catalog of football streams. Browsing is free; opening a
//! watch session costs 0.08 STX and is guarded by the `fc402-http` payment gate.
//!
//! # Modules
//!
//! - [`config`] - Command line and environment configuration
//! - [`error`] - API error responses
//! - [`handlers`] - Axum route handlers and router builder
//! - [`pricing`] - Price tiers of the paid endpoints
//! - [`streams`] - The stream catalog and watch session payload
//! - [`util`] - Shutdown signal handling

pub mod config;
pub mod error;
pub mod handlers;
pub mod pricing;
pub mod streams;
pub mod util;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use fc402_http::constants::{EXPOSED_HEADERS, PROOF_HEADERS};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, ServerConfig};
pub use handlers::{ApiContext, ApiState, api_router};

/// Builds the complete application: routes, CORS, request tracing and the
/// catch-all `500` handler.
///
/// # Errors
///
/// Returns [`ConfigError::CorsOrigin`] if a configured origin is not a valid
/// header value.
pub fn app(config: &ServerConfig) -> Result<Router, ConfigError> {
    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|source| ConfigError::CorsOrigin {
                origin: origin.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let allowed_headers = std::iter::once(CONTENT_TYPE)
        .chain(PROOF_HEADERS.map(HeaderName::from_static))
        .collect::<Vec<_>>();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(allowed_headers)
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static));

    Ok(api_router(ApiContext::from_config(config))
        .layer(CatchPanicLayer::custom(error::internal_error))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
