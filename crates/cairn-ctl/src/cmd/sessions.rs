//! Session management commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json};
use super::status::{user_label, SessionInfo};

pub async fn cmd_session_drop(port: u16, session_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct DropResponse {
        session_id: String,
        dropped: bool,
    }

    let resp: DropResponse =
        delete_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    if resp.dropped {
        println!("✓ Session dropped: {}", resp.session_id);
    } else {
        println!("Session not found: {}", session_id);
    }

    Ok(())
}

pub async fn cmd_session_inspect(port: u16, session_id: &str) -> Result<()> {
    let resp: SessionInfo =
        get_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session Details");
    println!("═══════════════════════════════════════");
    println!("  ID       : {}", resp.session_id);
    println!("  Peer     : {}", resp.peer);
    println!("  User     : {}", user_label(&resp));
    println!("  Uptime   : {}s", resp.connected_secs);

    Ok(())
}
