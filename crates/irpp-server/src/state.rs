//! Shared application state.

use irpp_hardware::{LaserController, ServerConfig};
use std::sync::Arc;

/// State handed to every handler.
pub struct AppState {
    /// The one controller of this process.
    pub laser: Arc<LaserController>,
    /// Listener settings.
    pub server: ServerConfig,
}

impl AppState {
    /// Bundle the controller with the server settings.
    pub fn new(laser: Arc<LaserController>, server: ServerConfig) -> Self {
        Self { laser, server }
    }
}
