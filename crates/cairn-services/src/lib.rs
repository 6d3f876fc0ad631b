//! cairn-services: session bookkeeping and the service surface the
//! transport dispatches into.

pub mod auth;
pub mod error;
pub mod method;
pub mod service;
pub mod session;
pub mod user_store;

pub use auth::AuthCache;
pub use error::ServiceError;
pub use method::{Args, Method, MethodTable, Reply};
pub use service::{Authenticator, ServiceBindings, UserStore};
pub use session::{ConnectionRegistry, Outbound, SessionHandle, SessionId};
pub use user_store::MemoryUserStore;
