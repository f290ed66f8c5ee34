mod config;
mod service;

use anyhow::Context;
use axum::{
    http::{HeaderValue, Request},
    middleware::{Next, from_fn},
};
use claim_flow::{ClaimDesk, ClaimRepository, InMemoryClaimRepository, JsonFileClaimRepository};
use std::sync::Arc;
use tracing::{Instrument, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::service::{AppState, build_router};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "claims_console_service=debug,claim_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Tags every request with a fresh correlation id and runs it inside a span
/// carrying that id.
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env()?;

    let repository: Arc<dyn ClaimRepository> = match &config.store_path {
        Some(path) => {
            info!(path = %path.display(), "Using JSON file claim store");
            Arc::new(JsonFileClaimRepository::new(path))
        }
        None => {
            info!("Using in-memory claim store (set CLAIMS_STORE_PATH to persist)");
            Arc::new(InMemoryClaimRepository::seeded())
        }
    };

    let desk = ClaimDesk::new(repository, &config.engine);
    let app = build_router(AppState { desk }).layer(from_fn(correlation_id_middleware));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
