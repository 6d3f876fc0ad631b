use std::time::Instant;

use serde_json::Value;

use cairn_api::ApiState;

use crate::*;

/// Serve the status API for `node` on an OS-assigned port.
async fn serve_api(node: &Node) -> anyhow::Result<(String, tokio::sync::broadcast::Receiver<()>)> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let state = ApiState {
        registry: node.transport.registry().clone(),
        ws_port: node.transport.local_port().unwrap_or_default(),
        announce_keys: node.transport.announce_keys(),
        started_at: Instant::now(),
        shutdown_tx,
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, cairn_api::router(state)).await;
    });
    Ok((format!("http://{addr}/api"), shutdown_rx))
}

#[tokio::test]
async fn test_status_lists_sessions() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let (api, _shutdown) = serve_api(&node).await?;

    let _one = node.login("k1", "s1").await?;
    let _anonymous = node.connect().await?;

    let status: Value = reqwest::get(format!("{api}/status")).await?.json().await?;
    assert_eq!(status["ws_port"], node.transport.local_port().unwrap());
    assert_eq!(status["announce_keys"][0], KEY);
    assert_eq!(status["authenticated"], 1);

    let sessions = status["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["authenticated"], true);
    assert_eq!(sessions[0]["email"], "one@example.com");
    assert_eq!(sessions[1]["authenticated"], false);
    assert!(sessions[1]["email"].is_null());

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_inspect_session() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let (api, _shutdown) = serve_api(&node).await?;
    let _one = node.login("k1", "s1").await?;

    let id = node.transport.get_auth().keys().next().unwrap().to_string();
    let info: Value = reqwest::get(format!("{api}/sessions/{id}")).await?.json().await?;
    assert_eq!(info["session_id"], id.as_str());
    assert_eq!(info["email"], "one@example.com");

    let resp = reqwest::get(format!("{api}/sessions/not-hex")).await?;
    assert_eq!(resp.status().as_u16(), 400);
    let resp = reqwest::get(format!("{api}/sessions/{}", "00".repeat(16))).await?;
    assert_eq!(resp.status().as_u16(), 404);

    node.transport.stop().await;
    Ok(())
}

/// Dropping a session closes its socket and purges its principal.
#[tokio::test]
async fn test_drop_session() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let (api, _shutdown) = serve_api(&node).await?;
    let mut one = node.login("k1", "s1").await?;
    let _two = node.login("k2", "s2").await?;

    let id = node
        .transport
        .get_auth()
        .iter()
        .find(|(_, p)| p.api_key == "k1")
        .map(|(id, _)| id.to_string())
        .unwrap();

    let client = reqwest::Client::new();
    let resp: Value = client
        .delete(format!("{api}/sessions/{id}"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["dropped"], true);

    assert!(one.closed_by_server().await);
    wait_until("session purged", || node.transport.get_auth().len() == 1).await?;
    assert_eq!(node.transport.registry().len(), 1);

    let resp: Value = client
        .delete(format!("{api}/sessions/{id}"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["dropped"], false);

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_endpoint_signals() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let (api, mut shutdown) = serve_api(&node).await?;

    let resp = reqwest::Client::new()
        .post(format!("{api}/daemon/shutdown"))
        .send()
        .await?;
    assert!(resp.status().is_success());
    tokio::time::timeout(RECV_TIMEOUT, shutdown.recv()).await??;

    node.transport.stop().await;
    Ok(())
}

/// Stopping the transport closes every client socket.
#[tokio::test]
async fn test_stop_closes_clients() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let mut one = node.login("k1", "s1").await?;
    let mut anonymous = node.connect().await?;

    node.transport.stop().await;
    assert!(one.closed_by_server().await);
    assert!(anonymous.closed_by_server().await);
    assert!(Client::connect(&node.url()).await.is_err());
    Ok(())
}
