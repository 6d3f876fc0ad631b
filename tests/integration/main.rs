//! Cairn integration test harness.
//!
//! Every test runs a real node in-process: the WebSocket listener binds an
//! OS-assigned port on 127.0.0.1 and announces to a fake grape registry
//! served from the same runtime. Clients speak the wire format over
//! tokio-tungstenite.
//!
//!   cargo test --test integration
//!
//! Tests share nothing but the loopback interface.


pub use infra::*;

mod announce;
mod api;
mod dispatch;
mod login;
