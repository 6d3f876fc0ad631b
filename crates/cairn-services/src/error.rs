//! Errors surfaced to clients through reply frames.
//!
//! The `Display` output is exactly what ends up in the error slot of a
//! reply frame, so the first two variants keep their protocol codes.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Unknown method, or a method reserved for internal use.
    #[error("ERR_METHOD_NOT_FOUND")]
    FindMethod,
    /// Credentials rejected.
    #[error("ERR_AUTH_UNAUTHORIZED")]
    Auth,
    #[error("user store lookup failed: {0}")]
    Store(String),
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}
