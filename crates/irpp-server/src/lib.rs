//! REST and WebSocket front end for the MIRcat laser controller.
//!
//! Every laser route lives under `/api/daylight_mircat`. Handlers are thin:
//! they parse the request, call the matching [`LaserController`] operation
//! and wrap the outcome. Failures become JSON bodies carrying `success`,
//! `error` and `error_code`; see [`error::ApiError`].
//!
//! [`LaserController`]: irpp_hardware::LaserController

pub mod api;
pub mod dto;
pub mod error;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use server::{create_router, serve};
pub use state::AppState;
