use std::net::SocketAddr;

/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Failed to set up a freshly accepted session.
    #[error("session setup for {addr} failed: {source}")]
    SessionSetup {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Wire-level error on a session.
    #[error("wire error: {0}")]
    Wire(#[from] parmirror_proto::WireError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
