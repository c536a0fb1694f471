//! 402FC demo API server.
//!
//! # Usage
//!
//! ```bash
//! # Testnet, port 3001, payments to the default demo address
//! cargo run -p fc402-server
//!
//! # Mainnet with a custom recipient
//! NETWORK=mainnet STX_ADDRESS=SP... cargo run -p fc402-server --release
//!
//! # Verbose logging
//! RUST_LOG=debug,tower_http=debug cargo run -p fc402-server
//! ```
//!
//! See [`fc402_server::config`] for every option. `.env` is loaded on startup.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fc402_server::ServerConfig;
use fc402_server::util::SigDown;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("402FC API failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    if config.pay_to.network() != config.network {
        tracing::warn!(
            pay_to = %config.pay_to,
            network = %config.network,
            "Payment address does not belong to the configured network"
        );
    }

    let app = fc402_server::app(&config)?;
    let sig_down = SigDown::try_new()?;

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        network = %config.network,
        caip2 = %config.network.chain_id(),
        pay_to = %config.pay_to.truncated(),
        facilitator = %config.facilitator_url,
        "402FC API listening on http://{addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(sig_down.cancellation_token().cancelled_owned())
        .await?;
    sig_down.recv().await;

    tracing::info!("402FC API shut down gracefully");
    Ok(())
}
