use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use cairn_core::RequestId;
use cairn_services::ServiceError;

use crate::*;

/// App methods used by the dispatch tests. `_internalHelper` counts how
/// often it actually runs.
fn app(helper_calls: Arc<AtomicUsize>) -> impl FnOnce(&mut cairn_services::MethodTable) {
    move |table| {
        table
            .register_fn("echo", |args| async move { Ok(Value::Object(args)) })
            .register_fn("fail", |_| async { Err(ServiceError::failed("ledger unavailable")) })
            .register_fn("_internalHelper", move |_| {
                let calls = helper_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            });
    }
}

#[tokio::test]
async fn test_builtin_methods() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .methods(app(Arc::new(AtomicUsize::new(0))))
        .start()
        .await?;
    let mut client = node.connect().await?;

    let rid = client.call(json!({"method": "ping"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.correlation_id, RequestId::from(rid.as_str()));
    assert_eq!(reply.error, None);
    assert_eq!(reply.data, json!("pong"));

    client.call(json!({"method": "getServerTime"})).await?;
    let reply = client.recv().await?;
    assert!(reply.data.as_u64().is_some_and(|ms| ms > 0));

    client.call(json!({"method": "getMethods"})).await?;
    let reply = client.recv().await?;
    assert_eq!(
        reply.data,
        json!(["echo", "fail", "getMethods", "getServerTime", "ping"])
    );

    node.transport.stop().await;
    Ok(())
}

/// Calls do not need a login, and arguments arrive without `method`.
#[tokio::test]
async fn test_method_receives_args() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape)
        .methods(app(Arc::new(AtomicUsize::new(0))))
        .start()
        .await?;
    let mut client = node.connect().await?;

    client
        .call(json!({"method": "echo", "ledger": "main", "limit": 10}))
        .await?;
    let reply = client.recv().await?;
    assert_eq!(reply.error, None);
    assert_eq!(reply.data["ledger"], "main");
    assert_eq!(reply.data["limit"], 10);
    assert!(reply.data.get("method").is_none());

    client.call(json!({"method": "fail"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.error.as_deref(), Some("ledger unavailable"));
    assert_eq!(reply.data, Value::Null);

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_internal_method_not_callable() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let calls = Arc::new(AtomicUsize::new(0));
    let node = NodeBuilder::new(&grape)
        .methods(app(calls.clone()))
        .start()
        .await?;
    let mut client = node.login("k1", "s1").await?;

    let rid = client.call(json!({"method": "_internalHelper"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.correlation_id, RequestId::from(rid.as_str()));
    assert_eq!(reply.error.as_deref(), Some("ERR_METHOD_NOT_FOUND"));
    assert_eq!(reply.data, Value::Null);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    node.transport.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_method() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    let node = NodeBuilder::new(&grape).start().await?;
    let mut client = node.connect().await?;

    client.call(json!({"method": "getLedgers"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.error.as_deref(), Some("ERR_METHOD_NOT_FOUND"));

    client.call(json!({"ledger": "main"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.error.as_deref(), Some("ERR_METHOD_NOT_FOUND"));

    node.transport.stop().await;
    Ok(())
}

/// Until the initial announcements finish, calls are dropped but logins
/// are still answered.
#[tokio::test]
async fn test_calls_dropped_until_announced() -> anyhow::Result<()> {
    let grape = FakeGrape::start().await?;
    grape.hold();
    let node = NodeBuilder::new(&grape).build()?;

    let transport = node.transport.clone();
    let starting = tokio::spawn(async move { transport.start().await });
    wait_until("listener bound", || node.transport.local_addr().is_some()).await?;
    assert!(!node.transport.is_dispatching());

    let mut client = node.connect().await?;
    client.call(json!({"method": "ping"})).await?;
    assert!(client.recv_within(QUIET).await?.is_none());

    let reply = client.login("k1", "s1").await?;
    assert_eq!(reply.error, None);

    grape.release();
    starting.await??;
    assert!(node.transport.is_dispatching());

    let rid = client.call(json!({"method": "ping"})).await?;
    let reply = client.recv().await?;
    assert_eq!(reply.correlation_id, RequestId::from(rid.as_str()));
    assert_eq!(reply.data, json!("pong"));

    node.transport.stop().await;
    Ok(())
}
