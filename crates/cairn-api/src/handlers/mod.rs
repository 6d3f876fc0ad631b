//! HTTP API handlers. Read-only views of the transport plus a couple of
//! operator actions.

pub mod sessions;
pub mod status;

use std::time::Instant;

use axum::http::StatusCode;

use cairn_services::{ConnectionRegistry, SessionId};

#[derive(Clone)]
pub struct ApiState {
    pub registry: ConnectionRegistry,
    /// Port the WebSocket transport is bound to.
    pub ws_port: u16,
    /// Keys published to the rendezvous registry.
    pub announce_keys: Vec<String>,
    pub started_at: Instant,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

fn parse_session_id(hex_str: &str) -> Result<SessionId, (StatusCode, String)> {
    SessionId::parse_hex(hex_str).ok_or((
        StatusCode::BAD_REQUEST,
        "session_id must be 16 hex-encoded bytes".to_string(),
    ))
}

pub use sessions::{handle_session_drop, handle_session_inspect};
pub use status::{handle_shutdown, handle_status};
