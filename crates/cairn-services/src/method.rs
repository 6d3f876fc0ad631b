//! Method registration table. The RPC surface is closed and enumerable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use cairn_core::{ReplyFrame, RequestId};

use crate::error::ServiceError;
use crate::session::SessionHandle;

/// Named call arguments: the payload object without its `method` key.
pub type Args = Map<String, Value>;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// One-shot reply channel for a single call.
///
/// Answering consumes the value, so a method can reply at most once.
pub struct Reply {
    request_id: RequestId,
    session: SessionHandle,
    sent: bool,
}

impl Reply {
    pub fn new(request_id: RequestId, session: SessionHandle) -> Self {
        Self {
            request_id,
            session,
            sent: false,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn ok(mut self, data: Value) -> bool {
        self.sent = true;
        self.session.send_frame(&ReplyFrame::ok(self.request_id.clone(), data))
    }

    pub fn err(mut self, error: impl std::fmt::Display) -> bool {
        self.sent = true;
        self.session.send_frame(&ReplyFrame::err(self.request_id.clone(), error))
    }

    pub fn result(self, result: Result<Value, ServiceError>) -> bool {
        match result {
            Ok(data) => self.ok(data),
            Err(e) => self.err(e),
        }
    }

    /// Drop without replying, on purpose.
    pub fn discard(mut self) {
        self.sent = true;
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if !self.sent {
            tracing::warn!(
                session_id = %self.session.id,
                request_id = %self.request_id,
                "call finished without a reply"
            );
        }
    }
}

// ── Method ────────────────────────────────────────────────────────────────────

/// A callable entry in the table. The method owns its reply and is
/// responsible for answering it, errors included.
#[async_trait]
pub trait Method: Send + Sync {
    async fn call(&self, args: Args, reply: Reply);
}

/// Adapts an async closure returning `Result<Value, ServiceError>`.
pub struct FnMethod<F>(F);

#[async_trait]
impl<F, Fut> Method for FnMethod<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ServiceError>> + Send,
{
    async fn call(&self, args: Args, reply: Reply) {
        let result = (self.0)(args).await;
        reply.result(result);
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Maps method names to handlers. Built once at startup.
#[derive(Default, Clone)]
pub struct MethodTable {
    methods: HashMap<String, Arc<dyn Method>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names starting with `_` may be registered but are never resolvable.
    pub fn is_internal(name: &str) -> bool {
        name.starts_with('_')
    }

    pub fn register(&mut self, name: impl Into<String>, method: impl Method + 'static) -> &mut Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        self.register(name, FnMethod(f))
    }

    /// Look up a callable method. Internal and unknown names both yield
    /// `FindMethod`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Method>, ServiceError> {
        if Self::is_internal(name) {
            return Err(ServiceError::FindMethod);
        }
        self.methods.get(name).cloned().ok_or(ServiceError::FindMethod)
    }

    /// Public method names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .keys()
            .filter(|n| !Self::is_internal(n))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
