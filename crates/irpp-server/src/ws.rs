//! Status stream over WebSocket.
//!
//! A client receives the cached report on connect and then every report the
//! controller publishes. Incoming messages are ignored apart from `Close`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use irpp_hardware::StatusReport;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// GET /ws/daylight_mircat
pub async fn status_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_reports(socket, state))
}

async fn stream_reports(mut socket: WebSocket, state: Arc<AppState>) {
    let mut reports = state.laser.subscribe();
    debug!("status stream opened");

    if send_report(&mut socket, &state.laser.snapshot().await).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            received = reports.recv() => match received {
                Ok(report) => {
                    if send_report(&mut socket, &report).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "status stream client lagging, reports dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("status stream closed");
}

async fn send_report(socket: &mut WebSocket, report: &StatusReport) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(report) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize status report");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}
