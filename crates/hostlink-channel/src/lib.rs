//! Host communication and streamed-payload reassembly.
//!
//! This is the "just works" layer. Send requests to the host and await their
//! responses, receive push events, reassemble chunked binary results and run
//! the video frame ack protocol, over either transport topology.

pub mod channel;
pub mod chunk;
pub mod context;
pub mod correlator;
pub mod error;
pub mod handshake;
pub mod queue;
pub mod registry;
pub mod video;

#[cfg(test)]
mod testing;

pub use channel::{Channel, Dispatch, HandlerRegistration, PendingResponse, ResponseStream};
pub use chunk::{
    fetch_chunked, fetch_media, reassemble, select_delivery, AssembleAttachment, ChunkAssembler,
    ChunkDelivery, ChunkStream, CorrelatedDelivery, NamedHandlerDelivery,
    CALLBACK_DELIVERY_MIN_VERSION,
};
pub use context::{EmbeddingContext, FrameContext, HostVersion};
pub use correlator::Correlator;
pub use error::{ChannelError, Result};
pub use handshake::{initialize, HandshakeConfig, DEFAULT_HOST_VERSION};
pub use queue::ReadinessQueue;
pub use registry::{HandlerRegistry, PushHandler, WeakPushHandler};
pub use video::{
    notify_selected_video_effect_changed, register_for_video_effect, register_for_video_frame,
    EffectChangeType, FrameCompletion, PipelineStatus, VideoFrame, VideoFrameConfig,
    VideoFrameFormat, VideoFrameRegistration,
};
