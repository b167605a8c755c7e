use crate::config::Config;
use crate::server::SignalRelay;
use axum::routing::get;
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::websocket_handler;
use super::metrics::{metrics_handler, MetricsAccess};

/// Create the Axum router: the signaling WebSocket route plus health and metrics.
pub fn create_router(config: &Config) -> Router<Arc<SignalRelay>> {
    Router::new()
        .route(&config.relay.path, get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(MetricsAccess::from_config(&config.security)))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Router with the relay attached as state, ready for `axum::serve`.
pub fn build_app(relay: Arc<SignalRelay>, config: &Config) -> Router {
    create_router(config).with_state(relay)
}

fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let origins: Vec<_> = cors_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
