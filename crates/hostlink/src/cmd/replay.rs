use hostlink::channel::{Channel, PendingResponse};
use hostlink::transport::{
    FramedConfig, FramedTransport, FramelessTransport, InboundEvent, NativeBridge, ParentWindow,
};
use hostlink::wire::events::is_builtin;
use serde::Deserialize;
use serde_json::Value;

use crate::cmd::{read_json_lines, ReplayArgs, TopologyArg};
use crate::exit::{channel_error, data_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_dispatches, DispatchRow, OutputFormat};

const REPLAY_FUNCTION: &str = "replay";

/// One recorded inbound event.
#[derive(Debug, Deserialize)]
struct RecordedEvent {
    #[serde(default)]
    origin: Option<String>,
    /// Raw message text, or the message itself as JSON.
    data: Value,
}

impl RecordedEvent {
    fn into_inbound(self) -> InboundEvent {
        let data = match self.data {
            Value::String(raw) => raw,
            other => other.to_string(),
        };
        InboundEvent {
            origin: self.origin,
            data,
        }
    }
}

/// Outbound sinks: replay only inspects the inbound side.
struct DiscardWindow;

impl ParentWindow for DiscardWindow {
    fn post_message(&self, message: &str, target_origin: &str) -> hostlink::transport::Result<()> {
        tracing::trace!(target_origin, bytes = message.len(), "discarding outbound message");
        Ok(())
    }
}

struct DiscardBridge;

impl NativeBridge for DiscardBridge {
    fn frameless_post_message(&self, message: &str) -> hostlink::transport::Result<()> {
        tracing::trace!(bytes = message.len(), "discarding outbound message");
        Ok(())
    }
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let channel = build_channel(&args)?;
    channel.mark_ready();

    let _pending = issue_pending(&channel, args.pending)?;
    for event in &args.handlers {
        if is_builtin(event) {
            tracing::warn!(event = %event, "handler replaces a built-in listener");
        }
        let name = event.clone();
        channel.register_handler(event.clone(), move |payload| {
            tracing::info!(event = %name, args = payload.len(), "push event handled");
        });
    }

    let mut rows = Vec::new();
    for (line, text) in read_json_lines(&args.file)? {
        let recorded: RecordedEvent = serde_json::from_str(&text)
            .map_err(|err| data_error(&format!("line {line}"), err))?;
        let origin = recorded.origin.clone();
        let outcome = channel.on_receive(&recorded.into_inbound());
        tracing::debug!(line, outcome = %outcome, "replayed event");
        rows.push(DispatchRow::new(line, origin, outcome));
    }

    let unsettled = channel.pending_count();
    channel.teardown();
    if unsettled > 0 {
        tracing::info!(unsettled, "requests left without a response");
    }

    print_dispatches(&rows, format);
    Ok(SUCCESS)
}

fn build_channel(args: &ReplayArgs) -> CliResult<Channel> {
    match args.topology {
        TopologyArg::Framed => {
            let origin = args.origin.as_deref().ok_or_else(|| {
                CliError::new(USAGE, "--origin is required with --topology framed")
            })?;
            let config = args
                .allowed_origins
                .iter()
                .fold(FramedConfig::new(origin), |config, pattern| {
                    config.with_allowed_origin(pattern.clone())
                });
            Ok(Channel::new(FramedTransport::new(DiscardWindow, config)))
        }
        TopologyArg::Frameless => {
            if args.origin.is_some() || !args.allowed_origins.is_empty() {
                tracing::warn!("origins are ignored by the frameless topology");
            }
            Ok(Channel::new(FramelessTransport::new(DiscardBridge)))
        }
    }
}

fn issue_pending(channel: &Channel, count: u64) -> CliResult<Vec<PendingResponse>> {
    (0..count)
        .map(|n| {
            channel
                .call(REPLAY_FUNCTION, vec![Value::from(n)])
                .map_err(|err| channel_error("failed issuing request", err))
        })
        .collect()
}
