use hostlink_wire::{decode_inbound, InboundEnvelope, DEFAULT_MAX_MESSAGE_SIZE};

use crate::error::Result;
use crate::traits::{InboundEvent, Topology, Transport};

/// The native object a frameless host exposes to the embedded app.
pub trait NativeBridge: Send + Sync {
    /// The single inbound call of the bridge. Takes one serialized envelope.
    fn frameless_post_message(&self, message: &str) -> Result<()>;
}

/// Transport to a host reached through a native bridge.
///
/// Inbound messages are invoked directly by the native side, so there is no
/// origin to filter on; only the envelope shape is checked.
pub struct FramelessTransport<B> {
    bridge: B,
    max_message_size: usize,
}

impl<B: NativeBridge> FramelessTransport<B> {
    /// Create a frameless transport over `bridge`.
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Override the maximum accepted inbound message size.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Borrow the underlying bridge.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

impl<B: NativeBridge> Transport for FramelessTransport<B> {
    fn topology(&self) -> Topology {
        Topology::Frameless
    }

    fn post(&self, message: &str) -> Result<()> {
        self.bridge.frameless_post_message(message)
    }

    fn accept(&self, event: &InboundEvent) -> Option<InboundEnvelope> {
        match decode_inbound(&event.data, self.max_message_size) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                tracing::trace!("ignoring non-envelope native message: {err}");
                None
            }
        }
    }
}
