//! /sessions handlers: session inspection and management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use cairn_services::{ConnectionRegistry, SessionHandle};

use super::{parse_session_id, ApiState};

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub peer: String,
    pub connected_secs: u64,
    pub authenticated: bool,
    pub email: Option<String>,
}

pub(crate) fn session_info(registry: &ConnectionRegistry, handle: &SessionHandle) -> SessionInfo {
    let principal = registry.auth().get(&handle.id);
    SessionInfo {
        session_id: handle.id.to_string(),
        peer: handle.peer_addr.to_string(),
        connected_secs: handle.connected_at.elapsed().as_secs(),
        authenticated: principal.is_some(),
        email: principal.and_then(|p| p.email),
    }
}

// ── /sessions/:id (GET) ───────────────────────────────────────────────────────

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, (StatusCode, String)> {
    let id = parse_session_id(&session_id)?;
    let handle = state
        .registry
        .get(&id)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    Ok(Json(session_info(&state.registry, &handle)))
}

// ── /sessions/:id (DELETE) ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionDropResponse {
    pub session_id: String,
    pub dropped: bool,
}

/// Close the socket. The connection's own teardown removes the session
/// and its auth entry.
pub async fn handle_session_drop(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDropResponse>, (StatusCode, String)> {
    let id = parse_session_id(&session_id)?;
    let dropped = match state.registry.get(&id) {
        Some(handle) => {
            handle.close();
            true
        }
        None => false,
    };

    if dropped {
        tracing::info!(session_id = %session_id, "session dropped via API");
    }

    Ok(Json(SessionDropResponse {
        session_id,
        dropped,
    }))
}
