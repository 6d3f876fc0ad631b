//! cairnd: WebSocket RPC node.
//!
//! Accepts client sessions, authenticates them, dispatches calls into a
//! method table, pushes broadcasts to authenticated sessions and keeps the
//! node announced in the rendezvous registry.

pub mod announce;
pub mod error;
pub mod methods;
pub mod transport;

pub use announce::{AnnounceHandle, Announcer, DiscoveryLink, GrapeLink, LinkError};
pub use error::TransportError;
pub use transport::broadcast::{BroadcastEngine, Handler, SendOptions};
pub use transport::dispatch::RpcDispatcher;
pub use transport::{TransportEvent, TransportState, WsTransport};
