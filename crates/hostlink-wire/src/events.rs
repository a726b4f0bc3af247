//! Built-in function and event names.
//!
//! Requests and push events share a single namespace on the wire; these are
//! the names the core layer itself sends or listens for.

/// Readiness handshake request.
pub const INITIALIZE: &str = "initialize";

/// Chunked media retrieval request.
pub const GET_MEDIA: &str = "getMedia";

/// Host → app: a new video frame is available.
pub const VIDEO_NEW_FRAME: &str = "video.newVideoFrame";

/// App → host: the in-flight frame was processed.
pub const VIDEO_FRAME_PROCESSED: &str = "video.videoFrameProcessed";

/// App → host: processing the in-flight frame failed.
pub const VIDEO_NOTIFY_ERROR: &str = "video.notifyError";

/// App → host: start pushing frames.
pub const VIDEO_REGISTER_FOR_FRAME: &str = "video.registerForVideoFrame";

/// Host → app: the selected effect parameter changed.
pub const VIDEO_EFFECT_PARAMETER_CHANGE: &str = "video.effectParameterChange";

/// App → host: the app changed its selected effect.
pub const VIDEO_EFFECT_CHANGED: &str = "video.videoEffectChanged";

/// Returns a short label for a function or event name.
pub fn event_label(name: &str) -> &'static str {
    match name {
        INITIALIZE => "HANDSHAKE",
        GET_MEDIA => "MEDIA",
        VIDEO_NEW_FRAME | VIDEO_FRAME_PROCESSED | VIDEO_NOTIFY_ERROR | VIDEO_REGISTER_FOR_FRAME => {
            "VIDEO"
        }
        VIDEO_EFFECT_PARAMETER_CHANGE | VIDEO_EFFECT_CHANGED => "EFFECT",
        _ if name.starts_with(GET_MEDIA) => "MEDIA",
        _ => "USER",
    }
}

/// Returns true if the name is one the core layer uses itself.
pub fn is_builtin(name: &str) -> bool {
    event_label(name) != "USER"
}
