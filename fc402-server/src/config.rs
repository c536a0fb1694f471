//! Server configuration.
//!
//! Every option is a command line flag with an environment variable fallback.
//! `.env` in the working directory is loaded first by the binary.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: `0.0.0.0`)
//! - `PORT` - Port (default: `3001`)
//! - `NETWORK` - `mainnet` or `testnet`, also in CAIP-2 form (default: `testnet`)
//! - `STX_ADDRESS` - Recipient of payments
//! - `FACILITATOR_URL` - Facilitator advertised to clients
//! - `PUBLIC_BASE_URL` - Public origin used in challenge resource URLs
//! - `CORS_ORIGINS` - Comma-separated browser origins allowed to call the API

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use fc402::StacksNetwork;
use fc402::chain::StacksAddress;
use fc402_http::constants::DEFAULT_FACILITATOR_URL;
use url::Url;

/// Recipient used when `STX_ADDRESS` is not set.
pub const DEFAULT_PAY_TO: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

/// Configuration of the demo API.
#[derive(Parser, Debug, Clone)]
#[command(name = "fc402-server")]
#[command(about = "402FC pay-per-view demo API")]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port.
    #[arg(long, short, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Network payments settle on.
    #[arg(long, env = "NETWORK", default_value = "testnet", value_parser = parse_network)]
    pub network: StacksNetwork,

    /// Address that receives payments.
    #[arg(long, env = "STX_ADDRESS", default_value = DEFAULT_PAY_TO, value_parser = parse_address)]
    pub pay_to: StacksAddress,

    /// Facilitator advertised in legacy requirements.
    #[arg(long, env = "FACILITATOR_URL", default_value = DEFAULT_FACILITATOR_URL)]
    pub facilitator_url: String,

    /// Public origin of the API, e.g. `https://api.402fc.dev`. Derived from
    /// request headers when unset.
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<Url>,

    /// Browser origins allowed by CORS.
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://localhost:3001"
    )]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Errors turning configuration into a running application.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A CORS origin is not a legal header value.
    #[error("invalid CORS origin {origin:?}: {source}")]
    CorsOrigin {
        /// The offending origin.
        origin: String,
        /// Why it was rejected.
        source: axum::http::header::InvalidHeaderValue,
    },
}

#[allow(clippy::unnecessary_wraps)] // clap value parsers return Result
fn parse_network(value: &str) -> Result<StacksNetwork, Infallible> {
    Ok(StacksNetwork::resolve(value))
}

fn parse_address(value: &str) -> Result<StacksAddress, String> {
    StacksAddress::normalize(value).ok_or_else(|| format!("not a Stacks address: {value:?}"))
}
