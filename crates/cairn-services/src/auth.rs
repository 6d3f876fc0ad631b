//! Per-session principal cache.
//!
//! Written by the login path, purged by the connection registry on close.
//! Both go through [`ConnectionRegistry`] so a closed session can never be
//! re-authenticated. Everything outside this crate gets a read-only view.
//!
//! [`ConnectionRegistry`]: crate::session::ConnectionRegistry

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use cairn_core::Principal;

use crate::session::SessionId;

#[derive(Clone, Default)]
pub struct AuthCache(Arc<DashMap<SessionId, Principal>>);

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub(crate) fn set(&self, id: SessionId, principal: Principal) {
        self.0.insert(id, principal);
    }

    pub fn get(&self, id: &SessionId) -> Option<Principal> {
        self.0.get(id).map(|entry| entry.value().clone())
    }

    pub(crate) fn delete(&self, id: &SessionId) -> Option<Principal> {
        self.0.remove(id).map(|(_, p)| p)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.0.contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> Vec<(SessionId, Principal)> {
        self.0
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Read-only copy of the whole cache, keyed by session id.
    pub fn snapshot(&self) -> HashMap<SessionId, Principal> {
        self.0
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Distinct API keys of every cached principal.
    pub fn api_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.iter().map(|e| e.value().api_key.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
