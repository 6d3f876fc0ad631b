//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::sessions::{session_info, SessionInfo};
use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ws_port: u16,
    pub announce_keys: Vec<String>,
    pub uptime_secs: u64,
    pub authenticated: usize,
    pub sessions: Vec<SessionInfo>,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let sessions: Vec<SessionInfo> = state
        .registry
        .all()
        .iter()
        .map(|handle| session_info(&state.registry, handle))
        .collect();
    let authenticated = sessions.iter().filter(|s| s.authenticated).count();

    Json(StatusResponse {
        ws_port: state.ws_port,
        announce_keys: state.announce_keys.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        authenticated,
        sessions,
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
