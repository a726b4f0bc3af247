//! Host transport abstraction.
//!
//! Provides a unified interface over the two ways an embedded app can reach
//! its host:
//! - framed: the host is a parent window reached via cross-window messaging
//! - frameless: the host is a native bridge object with one inbound call
//!
//! This is the lowest layer that performs I/O. Everything else builds on top
//! of the [`Transport`] trait provided here.

pub mod error;
pub mod framed;
pub mod frameless;
pub mod traits;

pub use error::{Result, TransportError};
pub use framed::{origin_matches, FramedConfig, FramedTransport, ParentWindow};
pub use frameless::{FramelessTransport, NativeBridge};
pub use traits::{InboundEvent, Topology, Transport};
