use std::fmt;
use std::io;

use hostlink::channel::ChannelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        err if err.is_caller_error() => USAGE,
        ChannelError::Host(_) | ChannelError::ChannelClosed => FAILURE,
        ChannelError::Internal(_) | ChannelError::Json(_) | ChannelError::HandshakeFailed(_) => {
            DATA_INVALID
        }
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn data_error(context: &str, err: impl fmt::Display) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}
