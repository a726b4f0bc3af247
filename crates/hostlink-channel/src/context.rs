use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

const MAX_VERSION_LEN: usize = 16;

/// Where the embedded app is rendered inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameContext {
    Settings,
    Content,
    Authentication,
    Remove,
    Task,
    SidePanel,
    Stage,
    MeetingStage,
}

impl FrameContext {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameContext::Settings => "settings",
            FrameContext::Content => "content",
            FrameContext::Authentication => "authentication",
            FrameContext::Remove => "remove",
            FrameContext::Task => "task",
            FrameContext::SidePanel => "sidePanel",
            FrameContext::Stage => "stage",
            FrameContext::MeetingStage => "meetingStage",
        }
    }
}

impl fmt::Display for FrameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameContext {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        let context = match s {
            "settings" => FrameContext::Settings,
            "content" => FrameContext::Content,
            "authentication" => FrameContext::Authentication,
            "remove" => FrameContext::Remove,
            "task" => FrameContext::Task,
            "sidePanel" => FrameContext::SidePanel,
            "stage" => FrameContext::Stage,
            "meetingStage" => FrameContext::MeetingStage,
            other => {
                return Err(ChannelError::InvalidArgument(format!(
                    "unknown frame context '{other}'"
                )))
            }
        };
        Ok(context)
    }
}

/// Host platform version, `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl HostVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for HostVersion {
    type Err = ChannelError;

    /// Parses `major.minor` or `major.minor.patch`.
    fn from_str(version: &str) -> Result<Self> {
        if version.is_empty() || version.len() > MAX_VERSION_LEN {
            return Err(invalid_version(version, "bad length"));
        }

        let mut parts = version.split('.');
        let major = parts
            .next()
            .ok_or_else(|| invalid_version(version, "missing major"))?;
        let minor = parts
            .next()
            .ok_or_else(|| invalid_version(version, "missing minor"))?;
        let patch = parts.next().unwrap_or("0");

        if parts.next().is_some() {
            return Err(invalid_version(version, "expected '<major>.<minor>.<patch>'"));
        }

        let parse = |part: &str, what: &str| {
            part.parse::<u16>()
                .map_err(|_| invalid_version(version, &format!("non-numeric {what}")))
        };

        Ok(Self::new(
            parse(major, "major")?,
            parse(minor, "minor")?,
            parse(patch, "patch")?,
        ))
    }
}

fn invalid_version(version: &str, reason: &str) -> ChannelError {
    ChannelError::InvalidArgument(format!("invalid version '{version}': {reason}"))
}

/// What the bootstrap handshake learned about the embedding.
///
/// Answers the synchronous frame-context and platform-version gates that
/// guard context-restricted and version-gated operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingContext {
    pub frame_context: FrameContext,
    pub client_type: String,
    pub host_version: HostVersion,
}

impl EmbeddingContext {
    pub fn new(frame_context: FrameContext, host_version: HostVersion) -> Self {
        Self {
            frame_context,
            client_type: "web".to_string(),
            host_version,
        }
    }

    /// Fail with a caller error unless the current frame context is one of `allowed`.
    pub fn ensure_frame_context(
        &self,
        allowed: &[FrameContext],
        operation: &'static str,
    ) -> Result<()> {
        if allowed.contains(&self.frame_context) {
            return Ok(());
        }
        Err(ChannelError::WrongContext {
            operation,
            context: self.frame_context.to_string(),
        })
    }

    /// True if the host is at least `minimum`.
    pub fn supports_version(&self, minimum: HostVersion) -> bool {
        self.host_version >= minimum
    }

    /// Fail with a caller error unless the host is at least `minimum`.
    pub fn ensure_version(&self, minimum: HostVersion, operation: &'static str) -> Result<()> {
        if self.supports_version(minimum) {
            return Ok(());
        }
        Err(ChannelError::UnsupportedPlatform {
            operation,
            required: minimum.to_string(),
            actual: self.host_version.to_string(),
        })
    }
}
