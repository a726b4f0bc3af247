use hostlink_wire::HostError;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The operation is not allowed from the current frame context.
    #[error("{operation} is not allowed in frame context {context}")]
    WrongContext {
        operation: &'static str,
        context: String,
    },

    /// The host platform is too old for the operation.
    #[error("{operation} requires host version {required} (host is {actual})")]
    UnsupportedPlatform {
        operation: &'static str,
        required: String,
        actual: String,
    },

    /// The caller passed an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The host answered with an error.
    #[error("{0}")]
    Host(#[from] HostError),

    /// The host sent a malformed or absent payload where data was expected.
    #[error("internal protocol error: {0}")]
    Internal(String),

    /// The channel was torn down while the call was outstanding.
    #[error("channel closed")]
    ChannelClosed,

    /// The readiness handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChannelError {
    /// True for errors raised before anything was sent to the host.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ChannelError::WrongContext { .. }
                | ChannelError::UnsupportedPlatform { .. }
                | ChannelError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
