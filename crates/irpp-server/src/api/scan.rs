//! Scan endpoints.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use irpp_core::scan::{ManualStepRequest, MultispectralRequest, StepRequest, SweepRequest};

use super::ApiResult;
use crate::dto::{MessageResponse, ScanResponse};
use crate::state::AppState;

async fn scan_started(state: &AppState, what: &str) -> ScanResponse {
    let session = state.laser.snapshot().await.session;
    ScanResponse {
        success: true,
        message: format!("{} scan started", what),
        scan_mode: session.current_scan_mode,
        scan_in_progress: session.scan_in_progress,
    }
}

/// POST /api/daylight_mircat/scan/sweep
pub async fn start_sweep(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SweepRequest>, JsonRejection>,
) -> ApiResult<ScanResponse> {
    let Json(request) = payload?;
    state.laser.start_sweep(request).await?;
    Ok(Json(scan_started(&state, "Sweep").await))
}

/// POST /api/daylight_mircat/scan/step
pub async fn start_step(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StepRequest>, JsonRejection>,
) -> ApiResult<ScanResponse> {
    let Json(request) = payload?;
    state.laser.start_step(request).await?;
    Ok(Json(scan_started(&state, "Step").await))
}

/// POST /api/daylight_mircat/scan/multispectral
pub async fn start_multispectral(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MultispectralRequest>, JsonRejection>,
) -> ApiResult<ScanResponse> {
    let Json(request) = payload?;
    state.laser.start_multispectral(request).await?;
    Ok(Json(scan_started(&state, "Multispectral").await))
}

/// POST /api/daylight_mircat/scan/manual
pub async fn start_manual_step(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ManualStepRequest>, JsonRejection>,
) -> ApiResult<ScanResponse> {
    let Json(request) = payload?;
    state.laser.start_manual_step(request).await?;
    Ok(Json(scan_started(&state, "Manual step").await))
}

/// POST /api/daylight_mircat/scan/manual/step - advance one step.
pub async fn manual_step(State(state): State<Arc<AppState>>) -> ApiResult<ScanResponse> {
    state.laser.manual_step().await?;
    let session = state.laser.snapshot().await.session;
    Ok(Json(ScanResponse {
        success: true,
        message: "Advanced one step".to_string(),
        scan_mode: session.current_scan_mode,
        scan_in_progress: session.scan_in_progress,
    }))
}

/// POST /api/daylight_mircat/scan/stop
pub async fn stop_scan(State(state): State<Arc<AppState>>) -> ApiResult<MessageResponse> {
    state.laser.stop_scan().await?;
    Ok(Json(MessageResponse::ok("Scan stopped")))
}
