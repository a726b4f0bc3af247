use serde_json::Value;

use crate::envelope::{InboundEnvelope, OutboundEnvelope};
use crate::error::{Result, WireError};

/// Default maximum serialized message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Serialize an outbound envelope into its wire form.
pub fn encode_outbound(envelope: &OutboundEnvelope) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Parse an inbound wire message.
///
/// Rejects messages above `max_size` before parsing, and envelopes that carry
/// neither an `id` nor a `func` since nothing could ever route them.
pub fn decode_inbound(data: &str, max_size: usize) -> Result<InboundEnvelope> {
    if data.len() > max_size {
        return Err(WireError::MessageTooLarge {
            size: data.len(),
            max: max_size,
        });
    }

    let envelope: InboundEnvelope = serde_json::from_str(data)?;
    ensure_routable(envelope)
}

/// Parse an inbound message that already arrived as structured JSON.
pub fn decode_inbound_value(value: Value) -> Result<InboundEnvelope> {
    let envelope: InboundEnvelope = serde_json::from_value(value)?;
    ensure_routable(envelope)
}

fn ensure_routable(envelope: InboundEnvelope) -> Result<InboundEnvelope> {
    if envelope.id.is_none() && envelope.func.is_none() {
        return Err(WireError::Unroutable);
    }
    Ok(envelope)
}
