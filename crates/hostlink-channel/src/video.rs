//! Video frame push/ack pipeline and effect notifications.
//!
//! The host pushes one frame at a time on `video.newVideoFrame` and waits for
//! the app to answer with `video.videoFrameProcessed` or `video.notifyError`
//! before sending the next. Every delivered frame comes with a
//! [`FrameCompletion`] that must be consumed exactly once.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hostlink_wire::events::{
    VIDEO_EFFECT_CHANGED, VIDEO_EFFECT_PARAMETER_CHANGE, VIDEO_FRAME_PROCESSED, VIDEO_NEW_FRAME,
    VIDEO_NOTIFY_ERROR, VIDEO_REGISTER_FOR_FRAME,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::{Channel, WeakChannel};
use crate::context::{EmbeddingContext, FrameContext};
use crate::error::{ChannelError, Result};
use crate::registry::{PushHandler, WeakPushHandler};

const VIDEO_CONTEXTS: &[FrameContext] = &[FrameContext::SidePanel];

/// One frame pushed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, as the host encoded it (byte array or base64 string).
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luma_buffer_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl VideoFrame {
    /// Decode the pixel data. `None` if it is neither a byte array nor base64.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        match &self.data {
            Value::String(encoded) => STANDARD.decode(encoded).ok(),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
                .collect(),
            _ => None,
        }
    }

    fn from_args(args: &[Value]) -> Option<Self> {
        let raw = args.first().filter(|value| !value.is_null())?;
        let frame = match Self::deserialize(raw) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::trace!("dropping malformed video frame: {err}");
                return None;
            }
        };
        if frame.data.is_null() {
            tracing::trace!("dropping video frame without data");
            return None;
        }
        Some(frame)
    }
}

/// Pixel layout requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoFrameFormat {
    #[default]
    #[serde(rename = "NV12")]
    Nv12,
}

/// Sent with `video.registerForVideoFrame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoFrameConfig {
    pub format: VideoFrameFormat,
}

/// Where a registration is in the per-frame protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    AwaitingAck,
}

#[derive(Default)]
struct Pipeline {
    in_flight: AtomicUsize,
}

impl Pipeline {
    fn begin(&self) -> usize {
        self.in_flight.fetch_add(1, Ordering::SeqCst)
    }

    fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn status(&self) -> PipelineStatus {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            PipelineStatus::Idle
        } else {
            PipelineStatus::AwaitingAck
        }
    }
}

/// Single-use answer to one delivered frame.
///
/// `ack` and `fail` consume the handle, so a frame cannot be answered twice.
/// Dropping it unanswered leaves the host waiting and is logged.
pub struct FrameCompletion {
    channel: WeakChannel,
    pipeline: Arc<Pipeline>,
    done: bool,
}

impl FrameCompletion {
    /// Report the frame processed.
    pub fn ack(mut self) -> Result<()> {
        self.finish(VIDEO_FRAME_PROCESSED, Vec::new())
    }

    /// Report that processing the frame failed.
    pub fn fail(mut self, message: impl Into<String>) -> Result<()> {
        let message: String = message.into();
        self.finish(VIDEO_NOTIFY_ERROR, vec![Value::from(message)])
    }

    fn finish(&mut self, func: &str, args: Vec<Value>) -> Result<()> {
        self.done = true;
        self.pipeline.complete();
        let channel = self.channel.upgrade().ok_or(ChannelError::ChannelClosed)?;
        channel.notify(func, args)
    }
}

impl Drop for FrameCompletion {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("video frame dropped without ack or fail; host will not send further frames");
            self.pipeline.complete();
        }
    }
}

impl fmt::Debug for FrameCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCompletion")
            .field("done", &self.done)
            .finish()
    }
}

/// Handle to an active frame registration.
///
/// The registration stays active when this handle is dropped; call
/// [`unregister`](Self::unregister) to stop receiving frames.
pub struct VideoFrameRegistration {
    channel: WeakChannel,
    handler: WeakPushHandler,
    pipeline: Arc<Pipeline>,
}

impl VideoFrameRegistration {
    pub fn status(&self) -> PipelineStatus {
        self.pipeline.status()
    }

    /// Stop delivering frames.
    ///
    /// Returns false if a later registration already took over the frame
    /// handler; that registration is left in place.
    pub fn unregister(self) -> bool {
        let Some(channel) = self.channel.upgrade() else {
            return false;
        };
        let removed = channel.unregister_handler_if_current(VIDEO_NEW_FRAME, &self.handler);
        if !removed {
            tracing::debug!("video frame registration already superseded");
        }
        removed
    }
}

impl fmt::Debug for VideoFrameRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrameRegistration")
            .field("status", &self.status())
            .finish()
    }
}

/// Start receiving video frames.
///
/// Only allowed in the side panel. `callback` runs once per well-formed frame
/// and must answer it through the [`FrameCompletion`]; null or malformed frames
/// are dropped without a callback or a reply.
pub fn register_for_video_frame<F>(
    channel: &Channel,
    ctx: &EmbeddingContext,
    config: VideoFrameConfig,
    callback: F,
) -> Result<VideoFrameRegistration>
where
    F: Fn(VideoFrame, FrameCompletion) + Send + Sync + 'static,
{
    ctx.ensure_frame_context(VIDEO_CONTEXTS, VIDEO_REGISTER_FOR_FRAME)?;
    let config = serde_json::to_value(config)?;

    let pipeline = Arc::new(Pipeline::default());
    let weak = channel.downgrade();
    let handler_pipeline = pipeline.clone();
    let handler: PushHandler = Arc::new(move |args: Vec<Value>| {
        let Some(frame) = VideoFrame::from_args(&args) else {
            return;
        };
        if handler_pipeline.begin() > 0 {
            tracing::debug!("video frame arrived before the previous one was answered");
        }
        let completion = FrameCompletion {
            channel: weak.clone(),
            pipeline: handler_pipeline.clone(),
            done: false,
        };
        callback(frame, completion);
    });
    let identity = Arc::downgrade(&handler);
    channel.register_push_handler(VIDEO_NEW_FRAME.to_string(), handler);

    channel.notify(VIDEO_REGISTER_FOR_FRAME, vec![config])?;
    Ok(VideoFrameRegistration {
        channel: channel.downgrade(),
        handler: identity,
        pipeline,
    })
}

/// Listen for the host selecting a different video effect.
///
/// `callback` receives the new effect id, or `None` when effects are cleared.
pub fn register_for_video_effect<F>(channel: &Channel, ctx: &EmbeddingContext, callback: F) -> Result<()>
where
    F: Fn(Option<String>) + Send + Sync + 'static,
{
    ctx.ensure_frame_context(VIDEO_CONTEXTS, VIDEO_EFFECT_PARAMETER_CHANGE)?;
    channel.register_handler(VIDEO_EFFECT_PARAMETER_CHANGE, move |args| {
        let effect_id = args.first().and_then(Value::as_str).map(str::to_string);
        callback(effect_id);
    });
    Ok(())
}

/// Kind of effect change reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectChangeType {
    EffectChanged,
    EffectDisabled,
}

/// Tell the host the app changed (or disabled) its selected effect.
pub fn notify_selected_video_effect_changed(
    channel: &Channel,
    ctx: &EmbeddingContext,
    kind: EffectChangeType,
    effect_id: Option<&str>,
) -> Result<()> {
    ctx.ensure_frame_context(VIDEO_CONTEXTS, VIDEO_EFFECT_CHANGED)?;
    channel.notify(
        VIDEO_EFFECT_CHANGED,
        vec![serde_json::to_value(kind)?, effect_id.map_or(Value::Null, Value::from)],
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::context::HostVersion;
    use crate::testing::ready_channel;

    type Delivered = Arc<Mutex<Vec<(VideoFrame, FrameCompletion)>>>;

    fn side_panel() -> EmbeddingContext {
        EmbeddingContext::new(FrameContext::SidePanel, HostVersion::new(2, 0, 1))
    }

    fn register(channel: &Channel) -> (VideoFrameRegistration, Delivered) {
        let delivered: Delivered = Arc::default();
        let sink = delivered.clone();
        let registration = register_for_video_frame(
            channel,
            &side_panel(),
            VideoFrameConfig::default(),
            move |frame, completion| sink.lock().unwrap().push((frame, completion)),
        )
        .unwrap();
        (registration, delivered)
    }

    fn frame() -> Value {
        json!({"width": 2, "height": 1, "data": [1, 2, 3]})
    }

    #[test]
    fn registration_requests_nv12_frames() {
        let (channel, bridge) = ready_channel();
        let (registration, _) = register(&channel);

        let sent = bridge.last();
        assert_eq!(sent.func, VIDEO_REGISTER_FOR_FRAME);
        assert_eq!(sent.args, vec![json!({"format": "NV12"})]);
        assert!(channel.has_handler(VIDEO_NEW_FRAME));
        assert_eq!(registration.status(), PipelineStatus::Idle);
    }

    #[test]
    fn ack_sends_processed_and_returns_to_idle() {
        let (channel, bridge) = ready_channel();
        let (registration, delivered) = register(&channel);

        assert!(channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]));
        assert_eq!(registration.status(), PipelineStatus::AwaitingAck);

        let (frame, completion) = delivered.lock().unwrap().pop().unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        completion.ack().unwrap();

        let sent = bridge.last();
        assert_eq!(sent.func, VIDEO_FRAME_PROCESSED);
        assert!(sent.args.is_empty());
        assert_eq!(registration.status(), PipelineStatus::Idle);
    }

    #[test]
    fn opaque_frame_data_is_delivered_once() {
        let (channel, bridge) = ready_channel();
        let (_registration, delivered) = register(&channel);
        let before = bridge.count();

        channel.dispatch_event(VIDEO_NEW_FRAME, vec![json!({"width": 30, "height": 40, "data": 101})]);

        let (frame, completion) = delivered.lock().unwrap().pop().unwrap();
        assert_eq!(frame.data, json!(101));
        assert_eq!(frame.data_bytes(), None);
        completion.ack().unwrap();

        let sent = bridge.sent();
        assert_eq!(sent.len(), before + 1);
        assert_eq!(sent[before].func, VIDEO_FRAME_PROCESSED);
        assert!(sent[before].args.is_empty());
    }

    #[test]
    fn fail_sends_notify_error_with_message() {
        let (channel, bridge) = ready_channel();
        let (registration, delivered) = register(&channel);

        channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]);
        let (_, completion) = delivered.lock().unwrap().pop().unwrap();
        completion.fail("boom").unwrap();

        let sent = bridge.last();
        assert_eq!(sent.func, VIDEO_NOTIFY_ERROR);
        assert_eq!(sent.args, vec![json!("boom")]);
        assert_eq!(registration.status(), PipelineStatus::Idle);
    }

    #[test]
    fn absent_or_malformed_frames_are_dropped() {
        let (channel, bridge) = ready_channel();
        let (registration, delivered) = register(&channel);
        let before = bridge.count();

        channel.dispatch_event(VIDEO_NEW_FRAME, vec![]);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![Value::Null]);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![json!({"width": 2, "height": 1, "data": null})]);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![json!({"width": 2, "height": 1})]);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![json!({"width": "wide", "data": [1]})]);

        assert!(delivered.lock().unwrap().is_empty());
        assert_eq!(bridge.count(), before);
        assert_eq!(registration.status(), PipelineStatus::Idle);
    }

    #[test]
    fn unanswered_completion_returns_to_idle_without_reply() {
        let (channel, bridge) = ready_channel();
        let (registration, delivered) = register(&channel);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]);
        let before = bridge.count();

        delivered.lock().unwrap().clear();

        assert_eq!(bridge.count(), before);
        assert_eq!(registration.status(), PipelineStatus::Idle);
    }

    #[test]
    fn wrong_context_fails_before_sending() {
        let (channel, bridge) = ready_channel();
        let content = EmbeddingContext::new(FrameContext::Content, HostVersion::new(2, 0, 1));

        let err = register_for_video_frame(&channel, &content, VideoFrameConfig::default(), |_, _| {})
            .unwrap_err();
        assert!(matches!(err, ChannelError::WrongContext { .. }));
        assert!(register_for_video_effect(&channel, &content, |_| {}).is_err());
        assert!(notify_selected_video_effect_changed(
            &channel,
            &content,
            EffectChangeType::EffectChanged,
            Some("e1")
        )
        .is_err());

        assert_eq!(bridge.count(), 0);
        assert_eq!(channel.handler_count(), 0);
    }

    #[test]
    fn unregister_stops_delivery() {
        let (channel, _bridge) = ready_channel();
        let (registration, delivered) = register(&channel);
        assert!(registration.unregister());

        assert!(!channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]));
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_registration_does_not_remove_newer_one() {
        let (channel, _bridge) = ready_channel();
        let (first, first_delivered) = register(&channel);
        let (second, second_delivered) = register(&channel);

        assert!(!first.unregister());
        assert!(channel.has_handler(VIDEO_NEW_FRAME));
        assert!(channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]));
        assert!(first_delivered.lock().unwrap().is_empty());
        assert_eq!(second_delivered.lock().unwrap().len(), 1);

        assert!(second.unregister());
        assert!(!channel.has_handler(VIDEO_NEW_FRAME));
    }

    #[test]
    fn ack_after_teardown_reports_closed() {
        let (channel, _bridge) = ready_channel();
        let (_registration, delivered) = register(&channel);
        channel.dispatch_event(VIDEO_NEW_FRAME, vec![frame()]);
        let (_, completion) = delivered.lock().unwrap().pop().unwrap();

        channel.teardown();

        assert!(matches!(completion.ack(), Err(ChannelError::ChannelClosed)));
    }

    #[test]
    fn effect_changes_reach_callback() {
        let (channel, _bridge) = ready_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        register_for_video_effect(&channel, &side_panel(), move |id| sink.lock().unwrap().push(id)).unwrap();

        channel.dispatch_event(VIDEO_EFFECT_PARAMETER_CHANGE, vec![json!("blur")]);
        channel.dispatch_event(VIDEO_EFFECT_PARAMETER_CHANGE, vec![Value::Null]);

        assert_eq!(*seen.lock().unwrap(), vec![Some("blur".to_string()), None]);
    }

    #[test]
    fn effect_change_notification_payload() {
        let (channel, bridge) = ready_channel();
        notify_selected_video_effect_changed(
            &channel,
            &side_panel(),
            EffectChangeType::EffectDisabled,
            None,
        )
        .unwrap();

        let sent = bridge.last();
        assert_eq!(sent.func, VIDEO_EFFECT_CHANGED);
        assert_eq!(sent.args, vec![json!("effectDisabled"), Value::Null]);
    }

    #[test]
    fn frame_data_decodes() {
        let mut frame: VideoFrame = serde_json::from_value(frame()).unwrap();
        assert_eq!(frame.data_bytes(), Some(vec![1, 2, 3]));

        frame.data = json!(STANDARD.encode([9u8, 8]));
        assert_eq!(frame.data_bytes(), Some(vec![9, 8]));

        frame.data = json!([300]);
        assert_eq!(frame.data_bytes(), None);
    }
}
