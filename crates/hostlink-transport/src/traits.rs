use std::fmt;

use hostlink_wire::{encode_outbound, InboundEnvelope, OutboundEnvelope};

use crate::error::Result;

/// How the embedded app reaches its host. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Host is a parent window.
    Framed,
    /// Host is a native bridge object.
    Frameless,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Framed => f.write_str("framed"),
            Topology::Frameless => f.write_str("frameless"),
        }
    }
}

/// A raw inbound event as the runtime hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Origin of the sender, when the runtime reports one.
    pub origin: Option<String>,
    /// Serialized envelope.
    pub data: String,
}

impl InboundEvent {
    /// An event from a windowed sender.
    pub fn from_origin(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            data: data.into(),
        }
    }

    /// An event invoked directly by a native bridge.
    pub fn native(data: impl Into<String>) -> Self {
        Self {
            origin: None,
            data: data.into(),
        }
    }
}

/// Physical delivery of envelopes to and from the host.
///
/// Implementations must not call back into the channel from `post`; host
/// responses always arrive later through the runtime's event mechanism.
pub trait Transport: Send + Sync {
    /// The topology this transport implements.
    fn topology(&self) -> Topology;

    /// Hand one serialized envelope to the host.
    fn post(&self, message: &str) -> Result<()>;

    /// Filter and decode an inbound event.
    ///
    /// Returns `None` for events that are not addressed to this channel
    /// (foreign origin, non-envelope payload).
    fn accept(&self, event: &InboundEvent) -> Option<InboundEnvelope>;

    /// Fire-and-forget delivery. Never fails outward: problems are logged and
    /// any pending call for this envelope simply stays pending.
    fn send(&self, envelope: &OutboundEnvelope) {
        let message = match encode_outbound(envelope) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(func = %envelope.func, id = ?envelope.id, "dropping unencodable envelope: {err}");
                return;
            }
        };

        match self.post(&message) {
            Ok(()) => {
                tracing::trace!(topology = %self.topology(), func = %envelope.func, id = ?envelope.id, "sent");
            }
            Err(err) => {
                tracing::warn!(topology = %self.topology(), func = %envelope.func, id = ?envelope.id, "send failed: {err}");
            }
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn topology(&self) -> Topology {
        (**self).topology()
    }

    fn post(&self, message: &str) -> Result<()> {
        (**self).post(message)
    }

    fn accept(&self, event: &InboundEvent) -> Option<InboundEnvelope> {
        (**self).accept(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::error::TransportError;

    struct FlakyTransport {
        posted: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Transport for FlakyTransport {
        fn topology(&self) -> Topology {
            Topology::Frameless
        }

        fn post(&self, message: &str) -> Result<()> {
            if self.fail {
                return Err(TransportError::BridgeFailed("bridge gone".to_string()));
            }
            self.posted.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn accept(&self, _event: &InboundEvent) -> Option<InboundEnvelope> {
            None
        }
    }

    #[test]
    fn send_encodes_and_posts() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let transport = FlakyTransport {
            posted: posted.clone(),
            fail: false,
        };

        transport.send(&OutboundEnvelope::request(1, "getMedia", vec![json!("a")]));

        let posted = posted.lock().unwrap();
        assert_eq!(posted.as_slice(), [r#"{"id":1,"func":"getMedia","args":["a"]}"#]);
    }

    #[test]
    fn send_swallows_post_failure() {
        let transport: Box<dyn Transport> = Box::new(FlakyTransport {
            posted: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        });

        transport.send(&OutboundEnvelope::notification("video.notifyError", vec![json!("x")]));
        assert_eq!(transport.topology(), Topology::Frameless);
    }

    #[test]
    fn topology_display() {
        assert_eq!(Topology::Framed.to_string(), "framed");
        assert_eq!(Topology::Frameless.to_string(), "frameless");
    }
}
