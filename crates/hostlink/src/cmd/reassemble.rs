use std::fs;

use hostlink::channel::{ChannelError, ChunkAssembler};
use serde_json::Value;

use crate::cmd::{read_json_lines, ReassembleArgs};
use crate::exit::{channel_error, data_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_reassembly, OutputFormat, ReassemblySummary};

pub fn run(args: ReassembleArgs, format: OutputFormat) -> CliResult<i32> {
    let lines = read_json_lines(&args.file)?;
    let (payload, chunks) = assemble(&lines)?;

    fs::write(&args.out, &payload)
        .map_err(|err| io_error(&format!("failed writing {}", args.out.display()), err))?;
    tracing::debug!(chunks, bytes = payload.len(), "payload reassembled");

    print_reassembly(
        &ReassemblySummary {
            chunks,
            bytes: payload.len(),
            out: args.out.display().to_string(),
        },
        format,
    );
    Ok(SUCCESS)
}

/// Run recorded chunk envelopes through the assembler. Lines after the
/// terminal chunk are ignored.
fn assemble(lines: &[(usize, String)]) -> CliResult<(Vec<u8>, usize)> {
    let mut assembler = ChunkAssembler::new();
    for (count, (line, text)) in lines.iter().enumerate() {
        let envelope: Value =
            serde_json::from_str(text).map_err(|err| data_error(&format!("line {line}"), err))?;
        let pushed = assembler
            .push_value(&envelope)
            .map_err(|err| chunk_error(*line, err))?;
        if let Some(payload) = pushed {
            if count + 1 < lines.len() {
                tracing::warn!(
                    ignored = lines.len() - count - 1,
                    "lines after the terminal chunk ignored"
                );
            }
            return Ok((payload.to_vec(), count + 1));
        }
    }
    Err(CliError::new(
        DATA_INVALID,
        format!(
            "stream ended before the terminal chunk ({} bytes buffered)",
            assembler.buffered_len()
        ),
    ))
}

fn chunk_error(line: usize, err: ChannelError) -> CliError {
    channel_error(&format!("line {line}"), err)
}
