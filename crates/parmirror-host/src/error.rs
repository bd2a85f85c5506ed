use crate::provider::ProviderError;

/// Errors that can occur in host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A collaborator (schema provider / value store) failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Wire-level error on the relay connection.
    #[error("wire error: {0}")]
    Wire(#[from] parmirror_proto::WireError),

    /// I/O error establishing or using the relay connection.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An outbound message could not be delivered.
///
/// Delivery is best-effort: the engine logs this and carries on. The
/// next full snapshot resynchronizes anything a dropped message lost.
#[derive(Debug, thiserror::Error)]
#[error("outbound send failed: {0}")]
pub struct SendFault(pub String);

pub type Result<T> = std::result::Result<T, HostError>;
