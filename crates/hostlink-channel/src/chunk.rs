//! Chunked binary payload reassembly.
//!
//! Large results (media files) arrive as a sequence of base64 chunk envelopes.
//! A chunk with sequence `> 0` means more data follows; sequence `<= 0` ends the
//! stream. Depending on the host version the chunks arrive either as partial
//! responses to one correlated request, or as push events on a uniquely named
//! handler registered for the duration of the call. The strategy is chosen once
//! per call; [`reassemble`] consumes both the same way.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use hostlink_wire::events::GET_MEDIA;
use hostlink_wire::ChunkEnvelope;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channel::{Channel, HandlerRegistration, ResponseStream};
use crate::context::{EmbeddingContext, HostVersion};
use crate::error::{ChannelError, Result};

/// First host version able to stream chunks as partial responses.
pub const CALLBACK_DELIVERY_MIN_VERSION: HostVersion = HostVersion::new(2, 0, 0);

/// One decoded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleAttachment {
    pub sequence: i64,
    pub data: Bytes,
}

/// Accumulates decoded chunks until the end-of-stream marker.
///
/// Any error (host-reported or malformed chunk) discards everything buffered so
/// far; partial payloads are never returned.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    attachments: Vec<AssembleAttachment>,
    buffered: usize,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the args of one inbound message; the chunk envelope is `args[0]`.
    pub fn push_args(&mut self, args: &[Value]) -> Result<Option<Bytes>> {
        self.push_value(args.first().unwrap_or(&Value::Null))
    }

    /// Feed one chunk envelope as JSON.
    pub fn push_value(&mut self, value: &Value) -> Result<Option<Bytes>> {
        if value.is_null() {
            return self.fail(ChannelError::Internal("chunk envelope missing".to_string()));
        }
        match ChunkEnvelope::deserialize(value) {
            Ok(envelope) => self.push(envelope),
            Err(err) => self.fail(ChannelError::Internal(format!("malformed chunk envelope: {err}"))),
        }
    }

    /// Feed one chunk envelope.
    ///
    /// Returns the assembled payload once the terminal chunk arrives.
    pub fn push(&mut self, envelope: ChunkEnvelope) -> Result<Option<Bytes>> {
        if let Some(err) = envelope.error {
            return self.fail(ChannelError::Host(err));
        }
        let Some(chunk) = envelope.media_chunk else {
            return self.fail(ChannelError::Internal("media chunk missing".to_string()));
        };

        match chunk.chunk.as_deref() {
            Some(payload) => {
                let data = match STANDARD.decode(payload) {
                    Ok(data) => data,
                    Err(err) => {
                        return self.fail(ChannelError::Internal(format!(
                            "chunk {} is not valid base64: {err}",
                            chunk.chunk_sequence
                        )))
                    }
                };
                if !data.is_empty() || !chunk.is_terminal() {
                    self.buffered += data.len();
                    self.attachments.push(AssembleAttachment {
                        sequence: chunk.chunk_sequence,
                        data: Bytes::from(data),
                    });
                }
            }
            None if chunk.is_terminal() => {}
            None => {
                return self.fail(ChannelError::Internal(format!(
                    "chunk {} has no payload",
                    chunk.chunk_sequence
                )))
            }
        }

        if chunk.is_terminal() {
            return Ok(Some(self.finish()));
        }
        Ok(None)
    }

    /// Chunks buffered so far, in arrival order.
    pub fn attachments(&self) -> &[AssembleAttachment] {
        &self.attachments
    }

    /// Decoded bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffered
    }

    /// Discard everything buffered.
    pub fn reset(&mut self) {
        self.attachments.clear();
        self.buffered = 0;
    }

    fn finish(&mut self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.buffered);
        for attachment in self.attachments.drain(..) {
            out.extend_from_slice(&attachment.data);
        }
        self.buffered = 0;
        out.freeze()
    }

    fn fail<T>(&mut self, err: ChannelError) -> Result<T> {
        if !self.attachments.is_empty() {
            tracing::debug!(
                chunks = self.attachments.len(),
                bytes = self.buffered,
                "discarding partial payload: {err}"
            );
        }
        self.reset();
        Err(err)
    }
}

/// The inbound messages of one chunked call, whichever way they arrive.
///
/// Dropping the stream cleans up: the pending call is released, or the named
/// handler is unregistered.
pub struct ChunkStream {
    source: ChunkSource,
}

enum ChunkSource {
    Correlated(ResponseStream),
    Named {
        rx: mpsc::UnboundedReceiver<Vec<Value>>,
        registration: HandlerRegistration,
    },
}

impl ChunkStream {
    /// Receive the args of the next chunk message. `None` if the source closed.
    pub async fn next(&mut self) -> Option<Result<Vec<Value>>> {
        match &mut self.source {
            ChunkSource::Correlated(stream) => stream.next().await,
            ChunkSource::Named { rx, .. } => rx.recv().await.map(Ok),
        }
    }

    /// Error for a source that closed before the terminal chunk arrived.
    ///
    /// A correlated call that was torn down already yielded `ChannelClosed`,
    /// so running dry here means the host sent its final response early.
    fn ended_early(&self) -> ChannelError {
        let closed = match &self.source {
            ChunkSource::Correlated(_) => false,
            ChunkSource::Named { registration, .. } => registration
                .channel()
                .is_none_or(|channel| channel.is_closed()),
        };
        if closed {
            ChannelError::ChannelClosed
        } else {
            ChannelError::Internal("chunk stream ended before the terminal chunk".to_string())
        }
    }

    /// Name of the handler this stream listens on, for the named strategy.
    pub fn handler_event(&self) -> Option<&str> {
        match &self.source {
            ChunkSource::Correlated(_) => None,
            ChunkSource::Named { registration, .. } => Some(registration.event()),
        }
    }
}

/// How chunk messages for one call are routed back to the caller.
pub trait ChunkDelivery {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Send the request and return the stream its chunks will arrive on.
    fn start(&self, channel: &Channel, function: &str, args: Vec<Value>) -> Result<ChunkStream>;
}

/// Chunks arrive as partial responses to one correlated request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelatedDelivery;

impl ChunkDelivery for CorrelatedDelivery {
    fn name(&self) -> &'static str {
        "correlated"
    }

    fn start(&self, channel: &Channel, function: &str, args: Vec<Value>) -> Result<ChunkStream> {
        let stream = channel.call_streaming(function, args)?;
        Ok(ChunkStream {
            source: ChunkSource::Correlated(stream),
        })
    }
}

/// Chunks arrive as push events on `<function><action id>`.
///
/// The action id is appended to the request args so the host knows which
/// event name to push to. For hosts predating callback-capable sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedHandlerDelivery;

impl ChunkDelivery for NamedHandlerDelivery {
    fn name(&self) -> &'static str {
        "named-handler"
    }

    fn start(&self, channel: &Channel, function: &str, mut args: Vec<Value>) -> Result<ChunkStream> {
        let action_id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = channel.register_scoped(format!("{function}{action_id}"), move |args| {
            if tx.send(args).is_err() {
                tracing::trace!("chunk arrived after reassembly finished");
            }
        });

        args.push(Value::from(action_id));
        channel.notify(function, args)?;

        Ok(ChunkStream {
            source: ChunkSource::Named { rx, registration },
        })
    }
}

/// Pick the delivery strategy the host supports.
pub fn select_delivery(ctx: &EmbeddingContext) -> Box<dyn ChunkDelivery + Send + Sync> {
    if ctx.supports_version(CALLBACK_DELIVERY_MIN_VERSION) {
        Box::new(CorrelatedDelivery)
    } else {
        Box::new(NamedHandlerDelivery)
    }
}

/// Drain a chunk stream into one payload.
///
/// Stops at the terminal chunk, the first error, or when the source closes.
/// Teardown rejects with [`ChannelError::ChannelClosed`]; a source that runs
/// dry on a live channel rejects with [`ChannelError::Internal`].
pub async fn reassemble(mut stream: ChunkStream) -> Result<Bytes> {
    let mut assembler = ChunkAssembler::new();
    while let Some(message) = stream.next().await {
        let args = message?;
        if let Some(payload) = assembler.push_args(&args)? {
            return Ok(payload);
        }
    }
    let err = stream.ended_early();
    tracing::debug!(
        buffered = assembler.buffered_len(),
        error = %err,
        "chunk source closed before terminal chunk"
    );
    Err(err)
}

/// Call `function` and reassemble its chunked result.
pub async fn fetch_chunked(
    channel: &Channel,
    ctx: &EmbeddingContext,
    function: &str,
    args: Vec<Value>,
) -> Result<Bytes> {
    let delivery = select_delivery(ctx);
    tracing::debug!(function, strategy = delivery.name(), "starting chunked fetch");
    let stream = delivery.start(channel, function, args)?;
    reassemble(stream).await
}

/// Retrieve the binary content of a host media item.
pub async fn fetch_media(channel: &Channel, ctx: &EmbeddingContext, media_id: &str) -> Result<Bytes> {
    if media_id.trim().is_empty() {
        return Err(ChannelError::InvalidArgument(
            "media id must not be empty".to_string(),
        ));
    }
    fetch_chunked(channel, ctx, GET_MEDIA, vec![Value::from(media_id)]).await
}
