//! Server push to authenticated sessions.
//!
//! A broadcast walks the registry in connect order, visiting only sessions
//! with a cached principal. One session failing never stops delivery to the
//! rest: its error goes back to that session as `[sid, message, null]`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use cairn_core::{Principal, ReplyFrame};
use cairn_services::{Args, ConnectionRegistry, ServiceError, SessionHandle, UserStore};

use crate::error::TransportError;

pub type ComputeFn =
    Arc<dyn Fn(Principal, Args) -> BoxFuture<'static, Result<Value, ServiceError>> + Send + Sync>;

/// What to send to each session.
#[derive(Clone)]
pub enum Handler {
    /// Send nothing. Every session is skipped.
    Skip,
    /// Same payload for every session.
    Literal(Value),
    /// Computed per session from its principal and `{...args, action}`.
    Compute(ComputeFn),
}

impl Handler {
    pub fn compute<F, Fut>(f: F) -> Self
    where
        F: Fn(Principal, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        let compute: ComputeFn = Arc::new(
            move |principal: Principal, args: Args| -> BoxFuture<'static, Result<Value, ServiceError>> {
                Box::pin(f(principal, args))
            },
        );
        Handler::Compute(compute)
    }
}

/// `null` skips, any other value is sent as-is.
impl From<Value> for Handler {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Handler::Skip,
            other => Handler::Literal(other),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Skip => f.write_str("Skip"),
            Handler::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Handler::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Re-read principals from the user store before sending.
    pub refresh_from_store: bool,
    /// Skip sessions whose principal is not active.
    pub active_only: bool,
}

impl SendOptions {
    pub fn active_users() -> Self {
        Self {
            refresh_from_store: true,
            active_only: true,
        }
    }
}

/// Fan-out over the sessions of one transport.
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: ConnectionRegistry,
    users: Arc<dyn UserStore>,
    listening: Arc<AtomicBool>,
    handler_timeout: Option<Duration>,
}

impl BroadcastEngine {
    pub fn new(
        registry: ConnectionRegistry,
        users: Arc<dyn UserStore>,
        listening: Arc<AtomicBool>,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            users,
            listening,
            handler_timeout,
        }
    }

    /// Returns `Ok(false)` without doing anything when the transport is not
    /// listening or nobody is logged in, `Ok(true)` once sessions were
    /// visited. Fails only if the user store refresh fails, in which case
    /// no session is visited.
    pub async fn send(
        &self,
        handler: &Handler,
        action: &str,
        args: &Args,
        opts: SendOptions,
    ) -> Result<bool, TransportError> {
        if !self.listening.load(Ordering::Acquire) || self.registry.auth().is_empty() {
            return Ok(false);
        }

        let fresh = if opts.refresh_from_store {
            let keys = self.registry.auth().api_keys();
            Some(self.users.users_by_api_keys(&keys).await?)
        } else {
            None
        };

        let mut call_args = args.clone();
        call_args.insert("action".to_string(), Value::String(action.to_string()));

        let targets = self.registry.authenticated();
        tracing::debug!(action, sessions = targets.len(), ?opts, "broadcast");

        for (session, cached) in targets {
            let principal = match &fresh {
                Some(records) => resolve_principal(cached, records),
                None => cached,
            };

            if opts.active_only && !principal.is_active() {
                continue;
            }
            // Closed while an earlier session's handler was running.
            if !self.registry.contains(&session.id) {
                continue;
            }

            match self.invoke(handler, principal, &call_args).await {
                Ok(None) => {}
                Ok(Some(result)) => {
                    let frame = ReplyFrame::broadcast(&session.id.to_string(), action, result);
                    deliver(&session, &frame);
                }
                Err(e) => {
                    tracing::debug!(session_id = %session.id, action, error = %e, "broadcast handler failed");
                    deliver(&session, &ReplyFrame::err(session.id.to_string(), e));
                }
            }
        }

        Ok(true)
    }

    /// `send` with a store refresh, restricted to active principals.
    pub async fn send_to_active_users(
        &self,
        handler: &Handler,
        action: &str,
        args: &Args,
    ) -> Result<bool, TransportError> {
        self.send(handler, action, args, SendOptions::active_users()).await
    }

    async fn invoke(
        &self,
        handler: &Handler,
        principal: Principal,
        args: &Args,
    ) -> Result<Option<Value>, ServiceError> {
        let compute = match handler {
            Handler::Skip => return Ok(None),
            Handler::Literal(value) => return Ok(Some(value.clone())),
            Handler::Compute(compute) => compute,
        };

        // The closure runs on first poll, so a panic while building the
        // future is caught too.
        let compute = compute.clone();
        let args = args.clone();
        let fut = AssertUnwindSafe(async move { compute(principal, args).await }).catch_unwind();
        let outcome = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ServiceError::failed("broadcast handler timed out"))?,
            None => fut.await,
        };
        match outcome {
            Ok(result) => result.map(Some),
            Err(_) => Err(ServiceError::failed("broadcast handler panicked")),
        }
    }
}

/// Merge the store record with the same credentials over the cached
/// principal, or keep the cached one if the store has no match.
fn resolve_principal(cached: Principal, fresh: &[Principal]) -> Principal {
    match fresh.iter().find(|record| record.matches_credentials(&cached)) {
        Some(record) => cached.refreshed_with(record),
        None => cached,
    }
}

fn deliver(session: &SessionHandle, frame: &ReplyFrame) {
    if !session.send_frame(frame) {
        tracing::debug!(session_id = %session.id, "broadcast target already closed");
    }
}
