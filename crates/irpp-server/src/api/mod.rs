//! HTTP handlers.

pub mod health;
pub mod laser;
pub mod scan;

use crate::error::ApiError;

/// Result type shared by the laser handlers.
pub type ApiResult<T> = Result<axum::Json<T>, ApiError>;
