use std::net::SocketAddr;

use cairn_services::ServiceError;

use crate::transport::TransportState;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport cannot start from state {0}")]
    InvalidState(TransportState),
    #[error("invalid bind address {0}")]
    BadAddress(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("user refresh failed: {0}")]
    Store(#[from] ServiceError),
}
