use std::time::Duration;

use serde_json::json;

use crate::*;

/// Startup announces `<service>:ws` with the bound port.
#[tokio::test]
async fn test_announce_shape() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let port = node.transport.local_port().unwrap();

    let announces = grape.announces();
    assert_eq!(announces.len(), 1);
    assert_eq!(announces[0]["data"], json!([KEY, port]));
    let rid = announces[0]["rid"].as_str().unwrap();
    assert_eq!(rid.len(), 32);
    assert!(rid.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(node.transport.announce_keys(), vec![KEY.to_string()]);
    node.transport.stop().await;
    Ok(())
}

/// Several services are announced once each, in configured order, before
/// `start` returns.
#[tokio::test]
async fn test_announce_order() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .services(&["rest:report:api", "rest:sync:api", "rest:audit:api"])
        .start()
        .await?;

    let keys: Vec<String> = grape
        .announces()
        .iter()
        .map(|body| body["data"][0].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        keys,
        vec!["rest:report:api:ws", "rest:sync:api:ws", "rest:audit:api:ws"]
    );

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_announce_repeats() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .tick(Duration::from_millis(50))
        .start()
        .await?;

    wait_until("three announcements", || grape.count(KEY) >= 3).await?;

    node.transport.stop().await;
    Ok(())
}

/// A registry that rejects every announce does not keep the node from
/// serving, and announcing keeps trying.
#[tokio::test]
async fn test_grape_failure_does_not_block_start() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    grape.fail(true);
    let node = NodeBuilder::new(&grape)
        .tick(Duration::from_millis(50))
        .start()
        .await?;
    assert!(node.transport.is_dispatching());

    let mut client = node.connect().await?;
    client.call(json!({"method": "ping"})).await?;
    assert_eq!(client.recv().await?.data, json!("pong"));

    wait_until("retries", || grape.count(KEY) >= 3).await?;

    node.transport.stop().await;
    Ok(())
}

/// An unreachable registry behaves like a failing one.
#[tokio::test]
async fn test_unreachable_grape() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .grape_url("http://127.0.0.1:1")
        .start()
        .await?;
    assert!(node.transport.is_dispatching());
    assert!(grape.announces().is_empty());

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_cancels_announcing() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .tick(Duration::from_millis(50))
        .start()
        .await?;
    wait_until("a repeat", || grape.count(KEY) >= 2).await?;

    node.transport.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_stop = grape.count(KEY);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(grape.count(KEY), after_stop);
    Ok(())
}
