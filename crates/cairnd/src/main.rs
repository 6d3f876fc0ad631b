//! cairnd: WebSocket RPC node daemon.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use cairn_core::config::CairnConfig;
use cairn_services::{MemoryUserStore, MethodTable, ServiceBindings};
use cairnd::{methods, GrapeLink, WsTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CairnConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CairnConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CairnConfig::default()
    });
    tracing::info!(
        ws_port = config.network.ws_port,
        grape = %config.discovery.grape_url,
        services = ?config.discovery.services,
        "cairnd starting"
    );

    // Service bindings
    let users = Arc::new(MemoryUserStore::with_users(config.users.clone()));
    tracing::info!(count = users.len(), "user store seeded");
    let bindings = ServiceBindings::new(
        methods::with_builtins(MethodTable::new()),
        users.clone(),
        users,
    );

    let link = Arc::new(
        GrapeLink::new(config.discovery.grape_url.clone()).context("failed to build grape link")?,
    );
    let api_port = config.network.api_port;
    let transport = Arc::new(WsTransport::new(config, bindings, link));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let mut shutdown_rx = shutdown_tx.subscribe();
    let local_addr = transport.start().await.context("failed to start transport")?;

    // Status HTTP endpoint
    let api_task = {
        let state = cairn_api::ApiState {
            registry: transport.registry().clone(),
            ws_port: local_addr.port(),
            announce_keys: transport.announce_keys(),
            started_at: Instant::now(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = cairn_api::serve(state, api_port).await {
                tracing::error!(error = %e, "status server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("status server exited: {:?}", r),
    }

    transport.stop().await;
    Ok(())
}
