use std::fmt;

use hostlink_wire::events::INITIALIZE;
use serde_json::Value;

use crate::channel::Channel;
use crate::context::{EmbeddingContext, FrameContext, HostVersion};
use crate::error::{ChannelError, Result};

const MAX_CLIENT_TYPE_LEN: usize = 32;

/// Host version assumed when the handshake reply omits one.
pub const DEFAULT_HOST_VERSION: HostVersion = HostVersion::new(2, 0, 1);

/// Configuration for the readiness handshake.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// Version of this SDK, sent to the host.
    pub sdk_version: String,
    /// Host version assumed when the host does not report one.
    pub default_host_version: HostVersion,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            default_host_version: DEFAULT_HOST_VERSION,
        }
    }
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("sdk_version", &self.sdk_version)
            .field("default_host_version", &self.default_host_version.to_string())
            .finish()
    }
}

/// Perform the readiness handshake.
///
/// Sends `initialize` ahead of the readiness queue, validates the host's
/// answer `[frameContext, clientType, runtimeConfig, hostVersion?]`, then marks
/// the channel ready (flushing anything queued meanwhile). On failure the
/// channel stays not ready.
pub async fn initialize(channel: &Channel, config: &HandshakeConfig) -> Result<EmbeddingContext> {
    config
        .sdk_version
        .parse::<HostVersion>()
        .map_err(|err| ChannelError::HandshakeFailed(format!("local sdk version: {err}")))?;

    let response = channel.call_unqueued(INITIALIZE, vec![Value::from(config.sdk_version.clone())])?;
    let args = response.await.map_err(|err| match err {
        ChannelError::Host(host) => ChannelError::HandshakeFailed(host.to_string()),
        other => other,
    })?;

    let context = parse_handshake_response(&args, config)?;
    channel.mark_ready();
    tracing::debug!(
        frame_context = %context.frame_context,
        client_type = %context.client_type,
        host_version = %context.host_version,
        "host handshake complete"
    );
    Ok(context)
}

fn parse_handshake_response(args: &[Value], config: &HandshakeConfig) -> Result<EmbeddingContext> {
    let frame_context = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::HandshakeFailed("missing frame context".to_string()))?
        .parse::<FrameContext>()
        .map_err(|err| ChannelError::HandshakeFailed(err.to_string()))?;

    let client_type = args
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::HandshakeFailed("missing client type".to_string()))?;
    if client_type.is_empty() || client_type.len() > MAX_CLIENT_TYPE_LEN {
        return Err(ChannelError::HandshakeFailed(format!(
            "invalid client type length: {}",
            client_type.len()
        )));
    }

    let host_version = match args.get(3) {
        None | Some(Value::Null) => config.default_host_version,
        Some(Value::String(version)) => version
            .parse::<HostVersion>()
            .map_err(|err| ChannelError::HandshakeFailed(err.to_string()))?,
        Some(other) => {
            return Err(ChannelError::HandshakeFailed(format!(
                "host version must be a string, got {other}"
            )))
        }
    };

    Ok(EmbeddingContext {
        frame_context,
        client_type: client_type.to_string(),
        host_version,
    })
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use hostlink_wire::{HostError, InboundEnvelope};
    use serde_json::json;

    use super::*;
    use crate::testing::frameless_channel;

    /// Poll once so the handshake sends `initialize`, then answer it.
    async fn handshake_with(
        response: impl FnOnce(u64) -> InboundEnvelope,
        config: HandshakeConfig,
    ) -> (Result<EmbeddingContext>, Channel, crate::testing::RecordingBridge) {
        let (channel, bridge) = frameless_channel();
        let result = {
            let mut fut = pin!(initialize(&channel, &config));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(fut.as_mut().poll(&mut cx).is_pending());

            let request = bridge.last();
            assert_eq!(request.func, INITIALIZE);
            channel.dispatch(response(request.id.expect("initialize is correlated")));

            fut.await
        };
        (result, channel, bridge)
    }

    #[tokio::test]
    async fn successful_handshake_marks_ready() {
        let (result, channel, _) = handshake_with(
            |id| {
                InboundEnvelope::response(
                    id,
                    vec![json!("sidePanel"), json!("desktop"), json!({}), json!("2.1.0")],
                )
            },
            HandshakeConfig::default(),
        )
        .await;

        let ctx = result.unwrap();
        assert_eq!(ctx.frame_context, FrameContext::SidePanel);
        assert_eq!(ctx.client_type, "desktop");
        assert_eq!(ctx.host_version, HostVersion::new(2, 1, 0));
        assert!(channel.is_ready());
    }

    #[tokio::test]
    async fn initialize_bypasses_queue_and_flushes_it() {
        let (channel, bridge) = frameless_channel();
        let early = channel.call("getContext", vec![]).unwrap();
        let config = HandshakeConfig::default();
        let mut fut = pin!(initialize(&channel, &config));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        let sent = bridge.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].func, INITIALIZE);

        let id = sent[0].id.unwrap();
        channel.dispatch(InboundEnvelope::response(id, vec![json!("content"), json!("web")]));
        let ctx = fut.await.unwrap();

        assert_eq!(ctx.host_version, config.default_host_version);
        let sent = bridge.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].id, Some(early.id()));
    }

    #[tokio::test]
    async fn host_error_fails_handshake() {
        let (result, channel, _) = handshake_with(
            |id| InboundEnvelope::error_response(id, HostError::new(100, "not supported")),
            HandshakeConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
        assert!(!channel.is_ready());
    }

    #[tokio::test]
    async fn unknown_frame_context_rejected() {
        let (result, channel, _) = handshake_with(
            |id| InboundEnvelope::response(id, vec![json!("popup"), json!("web")]),
            HandshakeConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
        assert!(!channel.is_ready());
    }

    #[tokio::test]
    async fn malformed_host_version_rejected() {
        let (result, _, _) = handshake_with(
            |id| {
                InboundEnvelope::response(
                    id,
                    vec![json!("content"), json!("web"), json!(null), json!("two")],
                )
            },
            HandshakeConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn oversized_client_type_rejected() {
        let (result, _, _) = handshake_with(
            |id| InboundEnvelope::response(id, vec![json!("content"), json!("x".repeat(64))]),
            HandshakeConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn invalid_local_version_fails_before_sending() {
        let (channel, bridge) = frameless_channel();
        let config = HandshakeConfig {
            sdk_version: "latest".to_string(),
            ..HandshakeConfig::default()
        };

        let result = initialize(&channel, &config).await;

        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
        assert_eq!(bridge.count(), 0);
    }

    #[tokio::test]
    async fn teardown_during_handshake_rejects() {
        let (channel, _bridge) = frameless_channel();
        let config = HandshakeConfig::default();
        let mut fut = pin!(initialize(&channel, &config));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        channel.teardown();

        assert!(matches!(fut.await, Err(ChannelError::ChannelClosed)));
    }
}
