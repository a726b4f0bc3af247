/// Errors that can occur while handing a message to the host.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The parent window rejected or could not deliver the message.
    #[error("failed to post to {target_origin}: {reason}")]
    PostFailed {
        target_origin: String,
        reason: String,
    },

    /// The native bridge rejected or could not deliver the message.
    #[error("native bridge call failed: {0}")]
    BridgeFailed(String),

    /// No host is reachable through this transport.
    #[error("host unavailable: {0}")]
    Unavailable(String),

    /// The envelope could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] hostlink_wire::WireError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
