//! Envelope types and JSON codec for host/embedded-app messaging.
//!
//! Every message exchanged with the host is a JSON envelope:
//! - outbound: `{"id"?, "func", "args"}` (requests carry an id, notifications don't)
//! - inbound: `{"id"? | "func"?, "args", "error"?, "isPartialResponse"?}`
//!
//! Both transport topologies carry exactly this shape, so everything above the
//! transport boundary is topology-agnostic.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod events;

pub use codec::{decode_inbound, decode_inbound_value, encode_outbound, DEFAULT_MAX_MESSAGE_SIZE};
pub use envelope::{
    ChunkEnvelope, HostError, InboundEnvelope, MediaChunk, OutboundEnvelope, ReportedError,
    RequestId,
};
pub use error::{Result, WireError};
