//! HTTP surface: the HTML form at `/` and the JSON API under `/api`.

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::transcribe::TranscriptProvider;

pub mod handlers;
pub mod page;

/// Immutable state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn TranscriptProvider>,
    pub language: String,
    pub strict_api_errors: bool,
}

impl AppState {
    pub fn new(provider: Arc<dyn TranscriptProvider>, config: &Config) -> Self {
        Self {
            provider,
            language: config.transcript.default_language.clone(),
            strict_api_errors: config.server.strict_api_errors,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::submit))
        .route("/api/transcript", get(handlers::api_transcript))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &Config, provider: Arc<dyn TranscriptProvider>) -> crate::Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(provider, config)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
