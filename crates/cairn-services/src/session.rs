//! Live WebSocket sessions.
//!
//! The registry owns every session handle for the lifetime of its socket
//! and owns the auth cache alongside it. Both maps change under the
//! registry lock, so a session id present in the auth cache is always
//! present in the registry, even when a login finishes after the socket
//! has already gone away.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use cairn_core::{Principal, ReplyFrame};

use crate::auth::AuthCache;

// ── Session id ────────────────────────────────────────────────────────────────

/// Opaque session token, generated at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Parse the hex form produced by `Display`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// ── Session handle ────────────────────────────────────────────────────────────

/// Work item for a session's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Cheap, cloneable handle to one live socket.
///
/// Sends go through the session's writer task. Once that task is gone every
/// send returns `false` and is otherwise ignored.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl SessionHandle {
    /// Create a handle plus the receiving end its writer task drains.
    pub fn new(peer_addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: SessionId::generate(),
            peer_addr,
            connected_at: Instant::now(),
            outbound: tx,
        };
        (handle, rx)
    }

    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    pub fn send_frame(&self, frame: &ReplyFrame) -> bool {
        match frame.encode() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "failed to encode reply frame");
                false
            }
        }
    }

    /// Ask the writer task to close the socket.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Live sessions in connect order, plus the auth cache they own.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<IndexMap<SessionId, SessionHandle>>>,
    auth: AuthCache,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: SessionHandle) {
        self.sessions.write().insert(handle.id, handle);
    }

    /// Drop a session and its auth entry in one step.
    pub fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write();
        self.auth.delete(id);
        sessions.shift_remove(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// All sessions, in insertion order.
    pub fn all(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Cache the principal for a session that is still registered.
    /// Returns false (and caches nothing) if the session already closed.
    pub fn authenticate(&self, id: &SessionId, principal: Principal) -> bool {
        let sessions = self.sessions.read();
        if !sessions.contains_key(id) {
            return false;
        }
        self.auth.set(*id, principal);
        true
    }

    /// Sessions that have a cached principal, in insertion order.
    pub fn authenticated(&self) -> Vec<(SessionHandle, Principal)> {
        let sessions = self.sessions.read();
        sessions
            .values()
            .filter_map(|handle| self.auth.get(&handle.id).map(|p| (handle.clone(), p)))
            .collect()
    }

    pub fn auth(&self) -> &AuthCache {
        &self.auth
    }

    /// Close every socket. Entries are removed by each connection's own
    /// teardown when its reader loop exits.
    pub fn close_all(&self) {
        for handle in self.sessions.read().values() {
            handle.close();
        }
    }
}
