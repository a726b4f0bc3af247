//! Recording transports shared by the unit tests.

use std::sync::{Arc, Mutex};

use hostlink_transport::{FramelessTransport, NativeBridge, ParentWindow, TransportError};
use hostlink_wire::OutboundEnvelope;

use crate::channel::Channel;

#[derive(Clone, Default)]
pub(crate) struct RecordingBridge {
    posted: Arc<Mutex<Vec<String>>>,
}

impl RecordingBridge {
    pub(crate) fn count(&self) -> usize {
        self.posted.lock().unwrap().len()
    }

    pub(crate) fn sent(&self) -> Vec<OutboundEnvelope> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    pub(crate) fn last(&self) -> OutboundEnvelope {
        self.sent().pop().expect("at least one message should be sent")
    }
}

impl NativeBridge for RecordingBridge {
    fn frameless_post_message(&self, message: &str) -> hostlink_transport::Result<()> {
        self.posted.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// A native bridge whose every post fails.
#[derive(Clone, Copy, Default)]
pub(crate) struct FailingBridge;

impl NativeBridge for FailingBridge {
    fn frameless_post_message(&self, _message: &str) -> hostlink_transport::Result<()> {
        Err(TransportError::BridgeFailed("host bridge unavailable".to_string()))
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingWindow {
    posted: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingWindow {
    pub(crate) fn targets(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }
}

impl ParentWindow for RecordingWindow {
    fn post_message(&self, message: &str, target_origin: &str) -> hostlink_transport::Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((message.to_string(), target_origin.to_string()));
        Ok(())
    }
}

/// A not-yet-ready channel over a recording native bridge.
pub(crate) fn frameless_channel() -> (Channel, RecordingBridge) {
    let bridge = RecordingBridge::default();
    let channel = Channel::new(FramelessTransport::new(bridge.clone()));
    (channel, bridge)
}

/// A ready channel over a recording native bridge.
pub(crate) fn ready_channel() -> (Channel, RecordingBridge) {
    let (channel, bridge) = frameless_channel();
    channel.mark_ready();
    (channel, bridge)
}
