//! Email relay server
//!
//! Accepts signature request notifications over HTTP and delivers them via
//! SendGrid. Configuration comes from the environment (see `RelayConfig`).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use email_relay::{router, RelayConfig, RelayState, SendGridProvider};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_current_span(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("email_relay=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = RelayConfig::from_env();
    if config.api_key.is_none() {
        bail!("RELAY_API_KEY must be set");
    }
    if config.sendgrid_api_key.is_none() {
        warn!("SENDGRID_API_KEY is not set; sends will fail until it is configured");
    }

    let http = reqwest::Client::new();
    let provider = Arc::new(SendGridProvider::new(&config, http.clone()));
    let port = config.port;
    let state = RelayState {
        config: Arc::new(config),
        provider,
        http,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(version = email_relay::VERSION, %addr, "Starting email relay");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
