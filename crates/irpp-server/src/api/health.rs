//! Root and health endpoints.

use axum::Json;

use crate::dto::{HealthResponse, RootResponse};

/// GET / - Service banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse::default())
}

/// GET /health - Liveness check; never touches the laser.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}
