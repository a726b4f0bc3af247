use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hostlink::channel::Dispatch;
use hostlink::wire::events::event_label;
use hostlink::wire::RequestId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one replayed inbound event.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DispatchRow {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl DispatchRow {
    pub fn new(line: usize, origin: Option<String>, dispatch: Dispatch) -> Self {
        let (outcome, id, event) = match dispatch {
            Dispatch::Settled(id) => ("settled", Some(id), None),
            Dispatch::Handled(event) => ("handled", None, Some(event)),
            Dispatch::Dropped => ("dropped", None, None),
            Dispatch::Filtered => ("filtered", None, None),
        };
        let kind = event.as_deref().map(event_label);
        Self {
            line,
            origin,
            outcome,
            id,
            event,
            kind,
        }
    }

    fn target(&self) -> String {
        match (&self.id, &self.event) {
            (Some(id), _) => format!("#{id}"),
            (None, Some(event)) => match self.kind {
                Some(kind) => format!("{event} ({kind})"),
                None => event.clone(),
            },
            (None, None) => "-".to_string(),
        }
    }
}

pub fn print_dispatches(rows: &[DispatchRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LINE", "ORIGIN", "OUTCOME", "TARGET"]);
            for row in rows {
                table.add_row(vec![
                    row.line.to_string(),
                    row.origin.clone().unwrap_or_else(|| "-".to_string()),
                    row.outcome.to_string(),
                    row.target(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "line={} origin={} {} {}",
                    row.line,
                    row.origin.as_deref().unwrap_or("-"),
                    row.outcome,
                    row.target()
                );
            }
        }
    }
}

/// Result of reassembling a recorded chunk stream.
#[derive(Debug, Serialize)]
pub struct ReassemblySummary {
    pub chunks: usize,
    pub bytes: usize,
    pub out: String,
}

pub fn print_reassembly(summary: &ReassemblySummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHUNKS", "BYTES", "OUT"])
                .add_row(vec![
                    summary.chunks.to_string(),
                    summary.bytes.to_string(),
                    summary.out.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "reassembled {} chunks ({} bytes) into {}",
                summary.chunks, summary.bytes, summary.out
            );
        }
    }
}
