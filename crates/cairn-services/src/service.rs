//! Service-side collaborators the transport calls into.

use std::sync::Arc;

use async_trait::async_trait;

use cairn_core::Principal;

use crate::error::ServiceError;
use crate::method::{Args, MethodTable};

/// Verifies login credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `auth` is the `auth` object of a login call. Returns the principal to
    /// cache for the session, or `ServiceError::Auth` on rejection.
    async fn login(&self, auth: &Args) -> Result<Principal, ServiceError>;
}

/// Source of truth for user records, queried for fresh data on broadcast.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// One batched lookup. Keys with no record are simply absent from the result.
    async fn users_by_api_keys(&self, api_keys: &[String]) -> Result<Vec<Principal>, ServiceError>;
}

/// Everything a transport instance dispatches into.
#[derive(Clone)]
pub struct ServiceBindings {
    pub methods: Arc<MethodTable>,
    pub authenticator: Arc<dyn Authenticator>,
    pub users: Arc<dyn UserStore>,
}

impl ServiceBindings {
    pub fn new(
        methods: MethodTable,
        authenticator: Arc<dyn Authenticator>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            methods: Arc::new(methods),
            authenticator,
            users,
        }
    }
}
