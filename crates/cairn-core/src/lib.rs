//! cairn-core: wire frames, principals and configuration.
//! All other cairn crates depend on this one.

pub mod config;
pub mod principal;
pub mod wire;

pub use principal::Principal;
pub use wire::{CallFrame, FrameError, ReplyFrame, RequestId};
