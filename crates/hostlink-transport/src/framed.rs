use hostlink_wire::{decode_inbound, InboundEnvelope, DEFAULT_MAX_MESSAGE_SIZE};

use crate::error::Result;
use crate::traits::{InboundEvent, Topology, Transport};

/// The parent window the embedded app posts to.
pub trait ParentWindow: Send + Sync {
    /// Post a serialized message to the window, restricted to `target_origin`.
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()>;
}

/// Configuration for the framed topology.
#[derive(Debug, Clone)]
pub struct FramedConfig {
    /// Origin outbound messages are addressed to. `*` posts to any origin.
    pub target_origin: String,
    /// Additional origins inbound messages are accepted from.
    /// Entries may use a leading wildcard label, e.g. `https://*.example.com`.
    pub allowed_origins: Vec<String>,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl FramedConfig {
    /// Post to and accept from a single origin.
    pub fn new(target_origin: impl Into<String>) -> Self {
        Self {
            target_origin: target_origin.into(),
            ..Self::default()
        }
    }

    /// Accept inbound messages from an extra origin pattern.
    pub fn with_allowed_origin(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_origins.push(pattern.into());
        self
    }
}

impl Default for FramedConfig {
    fn default() -> Self {
        Self {
            target_origin: "*".to_string(),
            allowed_origins: Vec::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Transport to a host that is the parent window.
pub struct FramedTransport<W> {
    window: W,
    config: FramedConfig,
}

impl<W: ParentWindow> FramedTransport<W> {
    /// Create a framed transport with explicit configuration.
    pub fn new(window: W, config: FramedConfig) -> Self {
        Self { window, config }
    }

    /// Borrow the underlying window.
    pub fn window(&self) -> &W {
        &self.window
    }

    /// Current configuration.
    pub fn config(&self) -> &FramedConfig {
        &self.config
    }

    fn is_trusted(&self, origin: &str) -> bool {
        origin_matches(&self.config.target_origin, origin)
            || self
                .config
                .allowed_origins
                .iter()
                .any(|pattern| origin_matches(pattern, origin))
    }
}

impl<W: ParentWindow> Transport for FramedTransport<W> {
    fn topology(&self) -> Topology {
        Topology::Framed
    }

    fn post(&self, message: &str) -> Result<()> {
        self.window
            .post_message(message, &self.config.target_origin)
    }

    fn accept(&self, event: &InboundEvent) -> Option<InboundEnvelope> {
        let Some(origin) = event.origin.as_deref() else {
            tracing::trace!("ignoring framed event without origin");
            return None;
        };
        if !self.is_trusted(origin) {
            tracing::trace!(origin, "ignoring event from untrusted origin");
            return None;
        }

        match decode_inbound(&event.data, self.config.max_message_size) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                tracing::trace!(origin, "ignoring non-envelope message: {err}");
                None
            }
        }
    }
}

/// Returns true if `origin` matches `pattern`.
///
/// Patterns are exact origins, `*` (any origin), or a scheme plus a leading
/// wildcard label (`https://*.example.com`), which matches any subdomain but
/// not the bare domain itself.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.eq_ignore_ascii_case(origin) {
        return true;
    }

    let (Some((pattern_scheme, pattern_host)), Some((scheme, host))) =
        (pattern.split_once("://"), origin.split_once("://"))
    else {
        return false;
    };
    if !pattern_scheme.eq_ignore_ascii_case(scheme) {
        return false;
    }

    let Some(suffix) = pattern_host.strip_prefix("*.") else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let suffix = suffix.to_ascii_lowercase();
    match host.strip_suffix(suffix.as_str()) {
        Some(prefix) => prefix.len() > 1 && prefix.ends_with('.'),
        None => false,
    }
}
