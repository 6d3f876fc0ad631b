//! In-memory user store backing the stock daemon.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use cairn_core::Principal;

use crate::error::ServiceError;
use crate::method::Args;
use crate::service::{Authenticator, UserStore};

/// User records keyed by API key.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, Principal>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Principal>) -> Self {
        let store = Self::new();
        for user in users {
            store.upsert(user);
        }
        store
    }

    pub fn upsert(&self, user: Principal) {
        self.users.insert(user.api_key.clone(), user);
    }

    /// Returns false if no user has this key.
    pub fn set_active(&self, api_key: &str, active: bool) -> bool {
        match self.users.get_mut(api_key) {
            Some(mut user) => {
                user.active = active;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, api_key: &str) -> Option<Principal> {
        self.users.remove(api_key).map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for MemoryUserStore {
    async fn login(&self, auth: &Args) -> Result<Principal, ServiceError> {
        let api_key = auth.get("apiKey").and_then(Value::as_str).ok_or(ServiceError::Auth)?;
        let api_secret = auth.get("apiSecret").and_then(Value::as_str).ok_or(ServiceError::Auth)?;

        let user = self.users.get(api_key).ok_or(ServiceError::Auth)?;
        if user.api_secret != api_secret {
            return Err(ServiceError::Auth);
        }
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn users_by_api_keys(&self, api_keys: &[String]) -> Result<Vec<Principal>, ServiceError> {
        Ok(api_keys
            .iter()
            .filter_map(|key| self.users.get(key).map(|user| user.clone()))
            .collect())
    }
}
