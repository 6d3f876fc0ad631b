//! Daemon status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

#[derive(Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub peer: String,
    pub connected_secs: u64,
    pub authenticated: bool,
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    ws_port: u16,
    announce_keys: Vec<String>,
    uptime_secs: u64,
    authenticated: usize,
    sessions: Vec<SessionInfo>,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Cairn Node Status");
    println!("═══════════════════════════════════════");
    println!("  WebSocket port   : {}", resp.ws_port);
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!("  Sessions         : {}", resp.sessions.len());
    println!("  Authenticated    : {}", resp.authenticated);
    println!("  Announced keys   : {}", resp.announce_keys.join(", "));

    if resp.sessions.is_empty() {
        println!("\n  No active sessions.");
    } else {
        println!("\n  Sessions:");
        for s in &resp.sessions {
            println!("  ┌─ {}", s.session_id);
            println!("  │  peer     : {}", s.peer);
            println!("  │  user     : {}", user_label(s));
            println!("  └─ uptime   : {}s", s.connected_secs);
        }
    }

    Ok(())
}

pub fn user_label(s: &SessionInfo) -> String {
    match (s.authenticated, &s.email) {
        (true, Some(email)) => email.clone(),
        (true, None) => "(logged in)".to_string(),
        (false, _) => "(anonymous)".to_string(),
    }
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
