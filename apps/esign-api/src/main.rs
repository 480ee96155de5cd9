//! eSignature API Server
//!
//! Provides REST endpoints for:
//! - Creating and sending signature requests
//! - Request status, dispatch history and document delivery
//! - The recipient signing flow behind emailed links

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod artifact;
mod config;
mod error;
mod handlers;
mod models;
mod state;
mod store;


use config::ApiConfig;
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Sender endpoints
        .route("/api/requests", post(handlers::create_request))
        .route("/api/requests/:id", get(handlers::get_request))
        .route("/api/requests/:id/document", get(handlers::get_document))
        .route("/api/requests/:id/resend", post(handlers::resend))
        // Signing link endpoints
        .route("/api/sign", get(handlers::signing_view))
        .route("/api/sign/fields/:field_id", post(handlers::fill_field))
        .route("/api/sign/complete", post(handlers::complete))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("esign_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing eSignature API...");
    let config = ApiConfig::from_env();
    let port = config.port;
    let state = Arc::new(AppState::new(config).await?);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting eSignature API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
