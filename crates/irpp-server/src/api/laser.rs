//! Connection, arming, tuning, emission and configuration endpoints.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use irpp_core::session::LaserMode;
use irpp_hardware::LaserConfig;

use super::ApiResult;
use crate::dto::{
    ArmResponse, ConnectionResponse, EmissionResponse, LaserModeRequest, MessageResponse,
    ModeResponse, PulseParametersRequest, PulseParametersResponse, StatusResponse, TuneRequest,
    TuneResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/daylight_mircat/connect
pub async fn connect(State(state): State<Arc<AppState>>) -> ApiResult<ConnectionResponse> {
    state.laser.connect().await?;
    Ok(Json(ConnectionResponse {
        success: true,
        message: "Connected to MIRcat laser".to_string(),
        connected: true,
    }))
}

/// POST /api/daylight_mircat/disconnect
pub async fn disconnect(State(state): State<Arc<AppState>>) -> ApiResult<ConnectionResponse> {
    state.laser.disconnect().await?;
    Ok(Json(ConnectionResponse {
        success: true,
        message: "Disconnected from MIRcat laser".to_string(),
        connected: false,
    }))
}

/// POST /api/daylight_mircat/arm
pub async fn arm(State(state): State<Arc<AppState>>) -> ApiResult<ArmResponse> {
    state.laser.arm().await?;
    Ok(Json(ArmResponse {
        success: true,
        message: "Laser armed".to_string(),
        armed: true,
    }))
}

/// POST /api/daylight_mircat/disarm
pub async fn disarm(State(state): State<Arc<AppState>>) -> ApiResult<ArmResponse> {
    state.laser.disarm().await?;
    Ok(Json(ArmResponse {
        success: true,
        message: "Laser disarmed".to_string(),
        armed: false,
    }))
}

/// POST /api/daylight_mircat/emission/on
pub async fn emission_on(State(state): State<Arc<AppState>>) -> ApiResult<EmissionResponse> {
    state.laser.emission_on().await?;
    Ok(Json(EmissionResponse {
        success: true,
        message: "Laser emission enabled".to_string(),
        emission_on: true,
    }))
}

/// POST /api/daylight_mircat/emission/off
pub async fn emission_off(State(state): State<Arc<AppState>>) -> ApiResult<EmissionResponse> {
    state.laser.emission_off().await?;
    Ok(Json(EmissionResponse {
        success: true,
        message: "Laser emission disabled".to_string(),
        emission_on: false,
    }))
}

/// POST /api/daylight_mircat/tune
pub async fn tune(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TuneRequest>, JsonRejection>,
) -> ApiResult<TuneResponse> {
    let Json(request) = payload?;
    state.laser.tune(request.wavenumber).await?;
    Ok(Json(TuneResponse {
        success: true,
        message: format!("Tuned to {} cm-1", request.wavenumber),
        wavenumber: request.wavenumber,
    }))
}

/// POST /api/daylight_mircat/mode
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LaserModeRequest>, JsonRejection>,
) -> ApiResult<ModeResponse> {
    let Json(request) = payload?;
    let mode: LaserMode = request.mode.parse().map_err(ApiError::BadRequest)?;
    state.laser.set_mode(mode).await?;
    Ok(Json(ModeResponse {
        success: true,
        message: format!("Laser mode set to {}", mode),
        mode,
    }))
}

/// POST /api/daylight_mircat/pulse-parameters
pub async fn set_pulse_parameters(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PulseParametersRequest>, JsonRejection>,
) -> ApiResult<PulseParametersResponse> {
    let Json(request) = payload?;
    state
        .laser
        .set_pulse_parameters(request.pulse_rate, request.pulse_width)
        .await?;
    Ok(Json(PulseParametersResponse {
        success: true,
        message: "Pulse parameters updated".to_string(),
        pulse_rate: request.pulse_rate,
        pulse_width: request.pulse_width,
    }))
}

/// POST /api/daylight_mircat/clear-error
pub async fn clear_error(State(state): State<Arc<AppState>>) -> ApiResult<MessageResponse> {
    state.laser.clear_error().await?;
    Ok(Json(MessageResponse::ok("Error cleared")))
}

/// GET /api/daylight_mircat/status
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let report = state.laser.status().await?;
    Ok(Json(StatusResponse {
        success: true,
        report,
    }))
}

/// GET /api/daylight_mircat/config
pub async fn config(State(state): State<Arc<AppState>>) -> Json<LaserConfig> {
    Json(state.laser.config().clone())
}
