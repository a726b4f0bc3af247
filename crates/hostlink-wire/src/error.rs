/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The message is not valid JSON or does not match the envelope shape.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The envelope carries neither a correlation id nor a function name.
    #[error("envelope has neither id nor func")]
    Unroutable,
}

pub type Result<T> = std::result::Result<T, WireError>;
