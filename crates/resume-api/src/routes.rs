//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, the upload body limit,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use resume_core::config::ResumeConfig;
use resume_core::error::{ResumeError, Result};

use crate::handlers;
use crate::state::AppState;

/// Slack on top of the upload limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.general.port;
    let body_limit = state
        .config
        .storage
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    // CORS: browser clients served from this host only.
    let origins: Vec<HeaderValue> = ["127.0.0.1", "localhost"]
        .iter()
        .filter_map(|host| format!("http://{}:{}", host, port).parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/search", get(handlers::search))
        .route("/upload", post(handlers::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Runs until the process receives Ctrl-C.
pub async fn start_server(config: &ResumeConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.general.bind_address, config.general.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ResumeError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
