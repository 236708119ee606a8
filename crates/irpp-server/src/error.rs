//! Mapping from controller errors to HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use irpp_core::error::{ErrorCode, LaserError};
use serde::Serialize;

/// Error type returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A controller operation failed.
    #[error(transparent)]
    Laser(#[from] LaserError),

    /// The request body could not be used.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    error_code: ErrorCode,
}

impl ApiError {
    /// Taxonomy code reported to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Laser(err) => err.code(),
            ApiError::BadRequest(_) => ErrorCode::InvalidParameter,
        }
    }

    /// HTTP status for an error code.
    ///
    /// Unmet preconditions are conflicts with the device state; waits that ran
    /// out of budget are gateway timeouts; failures reported by the SDK or the
    /// laser itself are bad gateways.
    pub fn status_for(code: ErrorCode) -> StatusCode {
        match code {
            ErrorCode::NotConnected
            | ErrorCode::NotArmed
            | ErrorCode::NotTuned
            | ErrorCode::InterlockFault
            | ErrorCode::SystemFault => StatusCode::CONFLICT,
            ErrorCode::InvalidParameter => StatusCode::BAD_REQUEST,
            ErrorCode::TuningTimeout
            | ErrorCode::EmissionTimeout
            | ErrorCode::TemperatureUnstable => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::SdkError | ErrorCode::HardwareError => StatusCode::BAD_GATEWAY,
            ErrorCode::CommunicationError => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: code,
        });
        (Self::status_for(code), body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
