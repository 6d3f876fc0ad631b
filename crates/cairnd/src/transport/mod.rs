//! WebSocket RPC transport.
//!
//! `WsTransport` owns one listener, its sessions and auth cache, the
//! announcement timers, and the broadcast engine. Lifecycle:
//! `Created → Listening → Stopped`. There is no way back from `Stopped`.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use cairn_core::config::CairnConfig;
use cairn_core::Principal;
use cairn_services::{Args, ConnectionRegistry, ServiceBindings, SessionId};

use crate::announce::{AnnounceHandle, Announcer, DiscoveryLink};
use crate::error::TransportError;

pub mod broadcast;
mod connection;
pub mod dispatch;

use self::broadcast::{BroadcastEngine, Handler, SendOptions};
use self::dispatch::RpcDispatcher;

const EVENT_CAPACITY: usize = 256;
const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Created,
    Listening,
    Stopped,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Created => "created",
            TransportState::Listening => "listening",
            TransportState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notifications, mostly for observers and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    SessionOpened { session_id: SessionId, peer_addr: SocketAddr },
    SessionClosed { session_id: SessionId },
    LoggedIn { session_id: SessionId, email: Option<String> },
    /// An inbound frame was not a JSON array. The session stays open.
    RequestError { session_id: SessionId, error: String },
}

/// State shared with every connection task.
pub(crate) struct Shared {
    registry: ConnectionRegistry,
    bindings: ServiceBindings,
    dispatcher: RpcDispatcher,
    /// Set once the initial announcements are done.
    dispatching: AtomicBool,
    events: tokio::sync::broadcast::Sender<TransportEvent>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

struct Status {
    state: TransportState,
    local_addr: Option<SocketAddr>,
}

#[derive(Default)]
struct Lifecycle {
    server: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    announcer: Option<AnnounceHandle>,
}

pub struct WsTransport {
    config: CairnConfig,
    shared: Arc<Shared>,
    link: Arc<dyn DiscoveryLink>,
    broadcaster: BroadcastEngine,
    listening: Arc<AtomicBool>,
    status: RwLock<Status>,
    lifecycle: Mutex<Lifecycle>,
}

impl WsTransport {
    pub fn new(config: CairnConfig, bindings: ServiceBindings, link: Arc<dyn DiscoveryLink>) -> Self {
        let registry = ConnectionRegistry::new();
        let listening = Arc::new(AtomicBool::new(false));
        let (events, _) = tokio::sync::broadcast::channel(EVENT_CAPACITY);

        let broadcaster = BroadcastEngine::new(
            registry.clone(),
            bindings.users.clone(),
            listening.clone(),
            config.broadcast.handler_timeout(),
        );
        let shared = Arc::new(Shared {
            registry,
            dispatcher: RpcDispatcher::new(bindings.methods.clone()),
            bindings,
            dispatching: AtomicBool::new(false),
            events,
        });

        Self {
            config,
            shared,
            link,
            broadcaster,
            listening,
            status: RwLock::new(Status {
                state: TransportState::Created,
                local_addr: None,
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Bind, start accepting sessions, run the initial announcements, then
    /// enable RPC dispatch. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, TransportError> {
        let mut life = self.lifecycle.lock().await;
        let state = self.state();
        if state != TransportState::Created {
            return Err(TransportError::InvalidState(state));
        }

        let network = &self.config.network;
        let ip: IpAddr = network
            .bind_addr
            .parse()
            .map_err(|_| TransportError::BadAddress(network.bind_addr.clone()))?;
        let addr = SocketAddr::new(ip, network.ws_port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = connection::router(self.shared.clone());
        let server = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "websocket server failed");
            }
        });

        {
            let mut status = self.status.write();
            status.state = TransportState::Listening;
            status.local_addr = Some(local_addr);
        }
        self.listening.store(true, Ordering::Release);
        tracing::info!(addr = %local_addr, "websocket transport listening");

        let announcer = Announcer::new(self.link.clone(), self.config.discovery.tick_interval());
        let announced = announcer
            .start(&self.config.discovery.announce_keys(), local_addr.port())
            .await;

        self.shared.dispatching.store(true, Ordering::Release);
        tracing::info!("rpc dispatch enabled");

        life.server = Some(server);
        life.shutdown = Some(shutdown_tx);
        life.announcer = Some(announced);
        Ok(local_addr)
    }

    /// Cancel announcements, close every session and the listener.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        let mut life = self.lifecycle.lock().await;
        {
            let mut status = self.status.write();
            if status.state == TransportState::Stopped {
                return;
            }
            status.state = TransportState::Stopped;
        }
        self.listening.store(false, Ordering::Release);
        self.shared.dispatching.store(false, Ordering::Release);

        if let Some(mut announcer) = life.announcer.take() {
            announcer.stop();
        }
        self.shared.registry.close_all();
        if let Some(tx) = life.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut server) = life.server.take() {
            if tokio::time::timeout(STOP_GRACE, &mut server).await.is_err() {
                tracing::warn!("websocket server did not stop in time, aborting");
                server.abort();
            }
        }
        tracing::info!("websocket transport stopped");
    }

    pub async fn send(
        &self,
        handler: &Handler,
        action: &str,
        args: &Args,
        opts: SendOptions,
    ) -> Result<bool, TransportError> {
        self.broadcaster.send(handler, action, args, opts).await
    }

    pub async fn send_to_active_users(
        &self,
        handler: &Handler,
        action: &str,
        args: &Args,
    ) -> Result<bool, TransportError> {
        self.broadcaster.send_to_active_users(handler, action, args).await
    }

    /// Copy of the auth cache.
    pub fn get_auth(&self) -> HashMap<SessionId, Principal> {
        self.shared.registry.auth().snapshot()
    }

    pub fn state(&self) -> TransportState {
        self.status.read().state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.status.read().local_addr
    }

    pub fn local_port(&self) -> Option<u16> {
        self.local_addr().map(|a| a.port())
    }

    pub fn is_dispatching(&self) -> bool {
        self.shared.dispatching.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.shared.registry
    }

    pub fn broadcaster(&self) -> &BroadcastEngine {
        &self.broadcaster
    }

    pub fn announce_keys(&self) -> Vec<String> {
        self.config.discovery.announce_keys()
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }
}
