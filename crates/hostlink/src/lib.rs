//! Messaging between an embedded app and its host.
//!
//! The app talks to the host over one of two topologies: a parent window
//! reached by cross-document messages, or a native bridge. Requests are
//! correlated with their responses, sends are held back until the host
//! handshake completes, push events reach registered handlers, and large
//! binary results are reassembled from streamed chunks.
//!
//! # Crate Structure
//!
//! - [`wire`]: JSON envelopes and their codec
//! - [`transport`]: the framed and frameless transports
//! - [`channel`]: correlation, readiness, push handlers, chunk reassembly and
//!   the video frame pipeline (behind the default `channel` feature)

/// Re-export wire types.
pub mod wire {
    pub use hostlink_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use hostlink_transport::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use hostlink_channel::*;
}
