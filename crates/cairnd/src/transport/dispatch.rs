//! Routes inbound calls to the method table.

use std::sync::Arc;

use tokio::task::JoinHandle;

use cairn_core::wire::LOGIN_METHOD;
use cairn_core::CallFrame;
use cairn_services::{MethodTable, Reply};

/// Resolves a call's method name and runs the method on its own task.
#[derive(Clone)]
pub struct RpcDispatcher {
    methods: Arc<MethodTable>,
}

impl RpcDispatcher {
    pub fn new(methods: Arc<MethodTable>) -> Self {
        Self { methods }
    }

    /// Dispatch one call.
    ///
    /// `login` is ignored here since the connection handles it. Unknown and
    /// internal names are answered with `ERR_METHOD_NOT_FOUND`. Otherwise the
    /// method owns `reply` and answers it whenever it finishes; the returned
    /// handle is only useful to tests.
    pub fn dispatch(&self, frame: &CallFrame, reply: Reply) -> Option<JoinHandle<()>> {
        let method = frame.method();
        if method == LOGIN_METHOD {
            reply.discard();
            return None;
        }

        match self.methods.resolve(method) {
            Ok(handler) => {
                tracing::debug!(method, request_id = %frame.request_id, "dispatching call");
                let args = frame.args();
                Some(tokio::spawn(async move { handler.call(args, reply).await }))
            }
            Err(e) => {
                tracing::debug!(method, error = %e, "rejected call");
                reply.err(e);
                None
            }
        }
    }
}
