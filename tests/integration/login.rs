use serde_json::json;

use cairn_core::RequestId;
use cairnd::TransportEvent;

use crate::*;

/// A valid login caches the principal and answers with its email.
#[tokio::test]
async fn test_login_caches_principal() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let mut events = node.transport.events();

    let mut client = node.connect().await?;
    let reply = client.login("k1", "s1").await?;
    assert_eq!(reply.error, None);
    assert_eq!(reply.data, json!("one@example.com"));

    let auth = node.transport.get_auth();
    assert_eq!(auth.len(), 1);
    let principal = auth.values().next().unwrap();
    assert_eq!(principal.api_key, "k1");
    assert_eq!(principal.email.as_deref(), Some("one@example.com"));

    let mut logged_in = false;
    while let Ok(event) = events.try_recv() {
        if let TransportEvent::LoggedIn { email, .. } = event {
            assert_eq!(email.as_deref(), Some("one@example.com"));
            logged_in = true;
        }
    }
    assert!(logged_in, "no LoggedIn event");

    node.transport.stop().await;
    Ok(())
}

/// Rejected credentials get an error reply and leave the cache alone.
#[tokio::test]
async fn test_login_rejected() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;

    let mut client = node.connect().await?;
    let reply = client.login("k1", "wrong").await?;
    assert_eq!(reply.error.as_deref(), Some("ERR_AUTH_UNAUTHORIZED"));
    assert!(node.transport.get_auth().is_empty());

    let reply = client.login("nobody", "s1").await?;
    assert_eq!(reply.error.as_deref(), Some("ERR_AUTH_UNAUTHORIZED"));
    assert!(node.transport.get_auth().is_empty());

    node.transport.stop().await;
    Ok(())
}

/// `login` without an `auth` object is dropped without a reply.
#[tokio::test]
async fn test_login_without_auth_is_silent() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;

    let mut client = node.connect().await?;
    client.call(json!({"method": "login"})).await?;
    client.call(json!({"method": "login", "auth": "k1:s1"})).await?;
    let ping = client.call(json!({"method": "ping"})).await?;

    // The first frame back belongs to the ping.
    let reply = client.recv().await?;
    assert_eq!(reply.correlation_id, RequestId::from(ping.as_str()));
    assert_eq!(reply.data, json!("pong"));
    assert!(client.recv_within(QUIET).await?.is_none());
    assert!(node.transport.get_auth().is_empty());

    node.transport.stop().await;
    Ok(())
}

/// A frame that is not a JSON array is reported, and the session survives.
#[tokio::test]
async fn test_malformed_frame_keeps_session() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let mut events = node.transport.events();

    let mut client = node.connect().await?;
    client.send_raw(r#"{"method":"ping"}"#).await?;
    client.send_raw("not json at all").await?;

    let mut errors = 0;
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while errors < 2 {
        let event = tokio::time::timeout_at(deadline, events.recv()).await??;
        if matches!(event, TransportEvent::RequestError { .. }) {
            errors += 1;
        }
    }
    assert!(client.recv_within(QUIET).await?.is_none());

    let rid = client.call(json!({"method": "ping"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.correlation_id, RequestId::from(rid.as_str()));
    assert_eq!(node.transport.registry().len(), 1);

    node.transport.stop().await;
    Ok(())
}

/// Closing a socket drops its cached principal.
#[tokio::test]
async fn test_close_purges_auth() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;

    let first = node.login("k1", "s1").await?;
    let _second = node.login("k2", "s2").await?;
    assert_eq!(node.transport.get_auth().len(), 2);

    first.close().await?;
    wait_until("auth purged", || node.transport.get_auth().len() == 1).await?;

    let keys: Vec<String> = node
        .transport
        .get_auth()
        .values()
        .map(|p| p.api_key.clone())
        .collect();
    assert_eq!(keys, vec!["k2".to_string()]);
    assert_eq!(node.transport.registry().len(), 1);

    node.transport.stop().await;
    Ok(())
}

/// Logging in again on the same socket replaces the cached principal.
#[tokio::test]
async fn test_relogin_overwrites() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;

    let mut client = node.login("k1", "s1").await?;
    let reply = client.login("k2", "s2").await?;
    assert_eq!(reply.data, json!("two@example.com"));

    let auth = node.transport.get_auth();
    assert_eq!(auth.len(), 1);
    assert_eq!(auth.values().next().unwrap().api_key, "k2");

    node.transport.stop().await;
    Ok(())
}
