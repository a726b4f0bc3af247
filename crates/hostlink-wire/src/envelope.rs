use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Correlation id assigned to every outbound request.
pub type RequestId = u64;

/// Message sent from the embedded app to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundEnvelope {
    /// Present for correlated requests, absent for fire-and-forget notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Function or event name.
    pub func: String,
    /// Ordered arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl OutboundEnvelope {
    /// Create a correlated request.
    pub fn request(id: RequestId, func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: Some(id),
            func: func.into(),
            args,
        }
    }

    /// Create a fire-and-forget notification.
    pub fn notification(func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: None,
            func: func.into(),
            args,
        }
    }

    /// True if this envelope expects a correlated response.
    pub fn is_request(&self) -> bool {
        self.id.is_some()
    }
}

/// Error reported by the host inside an inbound envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostError {
    #[serde(rename = "errorCode", alias = "code")]
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HostError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "host error {}: {}", self.code, message),
            None => write!(f, "host error {}", self.code),
        }
    }
}

impl std::error::Error for HostError {}

/// What an inbound `error` field turned out to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportedError {
    /// A well-formed host error.
    Host(HostError),
    /// Something non-empty that is not a host error (no code, wrong types).
    Malformed(Value),
}

/// `null`, `""` and `{}` all mean "no error".
fn is_empty_error(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn non_empty_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok((!is_empty_error(&value)).then_some(value))
}

fn non_empty_host_error<'de, D>(deserializer: D) -> std::result::Result<Option<HostError>, D::Error>
where
    D: Deserializer<'de>,
{
    match non_empty_value(deserializer)? {
        Some(value) => HostError::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Message delivered from the host to the embedded app.
///
/// Responses carry the `id` of the request they answer; push events carry a
/// `func` naming the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Raw error field. Kept untyped so a malformed error still reaches the
    /// pending call it belongs to; see [`InboundEnvelope::reported_error`].
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_value"
    )]
    pub error: Option<Value>,
    /// Set by the host on every response of a multi-part answer except the last.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_partial_response: bool,
}

impl InboundEnvelope {
    /// A final response to request `id`.
    pub fn response(id: RequestId, args: Vec<Value>) -> Self {
        Self {
            id: Some(id),
            args,
            ..Self::default()
        }
    }

    /// A non-final response to request `id`.
    pub fn partial_response(id: RequestId, args: Vec<Value>) -> Self {
        Self {
            id: Some(id),
            args,
            is_partial_response: true,
            ..Self::default()
        }
    }

    /// An error response to request `id`.
    pub fn error_response(id: RequestId, error: HostError) -> Self {
        Self {
            id: Some(id),
            error: serde_json::to_value(error).ok(),
            ..Self::default()
        }
    }

    /// Interpret the error field. `None` if the host reported no error.
    pub fn reported_error(&self) -> Option<ReportedError> {
        let raw = self.error.as_ref()?;
        Some(match HostError::deserialize(raw) {
            Ok(err) => ReportedError::Host(err),
            Err(_) => ReportedError::Malformed(raw.clone()),
        })
    }

    /// An unsolicited push event.
    pub fn push(func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            func: Some(func.into()),
            args,
            ..Self::default()
        }
    }
}

/// One piece of a chunked binary payload, carried as `args[0]` of a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_host_error"
    )]
    pub error: Option<HostError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_chunk: Option<MediaChunk>,
}

/// Base64 slice tagged with its sequence number.
///
/// A sequence `<= 0` marks the end of the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    #[serde(default)]
    pub chunk: Option<String>,
    pub chunk_sequence: i64,
}

impl MediaChunk {
    pub fn new(chunk: impl Into<String>, chunk_sequence: i64) -> Self {
        Self {
            chunk: Some(chunk.into()),
            chunk_sequence,
        }
    }

    /// True for the end-of-stream marker.
    pub fn is_terminal(&self) -> bool {
        self.chunk_sequence <= 0
    }
}
