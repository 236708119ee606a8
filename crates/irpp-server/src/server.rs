//! Axum server setup and routing.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{health, laser, scan};
use crate::state::AppState;
use crate::ws;

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let laser_routes = Router::new()
        .route("/connect", post(laser::connect))
        .route("/disconnect", post(laser::disconnect))
        .route("/arm", post(laser::arm))
        .route("/disarm", post(laser::disarm))
        .route("/emission/on", post(laser::emission_on))
        .route("/emission/off", post(laser::emission_off))
        .route("/tune", post(laser::tune))
        .route("/mode", post(laser::set_mode))
        .route("/pulse-parameters", post(laser::set_pulse_parameters))
        .route("/clear-error", post(laser::clear_error))
        .route("/status", get(laser::status))
        .route("/config", get(laser::config))
        // Scans
        .route("/scan/sweep", post(scan::start_sweep))
        .route("/scan/step", post(scan::start_step))
        .route("/scan/multispectral", post(scan::start_multispectral))
        .route("/scan/manual", post(scan::start_manual_step))
        .route("/scan/manual/step", post(scan::manual_step))
        .route("/scan/stop", post(scan::stop_scan));

    let cors = state.server.cors_allow_any.then(|| {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    });

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/ws/daylight_mircat", get(ws::status_stream))
        .nest("/api/daylight_mircat", laser_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(cors),
        )
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    state: Arc<AppState>,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local = listener.local_addr().context("listener has no local address")?;
    info!(address = %local, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
