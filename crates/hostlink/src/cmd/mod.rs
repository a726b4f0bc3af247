use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod reassemble;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Feed recorded inbound events through a channel and report each dispatch.
    Replay(ReplayArgs),
    /// Reassemble a recorded chunk stream into a file.
    Reassemble(ReassembleArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Reassemble(args) => reassemble::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TopologyArg {
    /// Parent window with origin filtering.
    Framed,
    /// Native bridge; origins are ignored.
    Frameless,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of `{"origin"?, "data"}` events.
    pub file: PathBuf,
    /// Transport topology to replay through.
    #[arg(long, value_enum, default_value = "frameless")]
    pub topology: TopologyArg,
    /// Host origin (framed only; required there).
    #[arg(long)]
    pub origin: Option<String>,
    /// Extra trusted origin pattern, e.g. `https://*.example.com` (repeatable).
    #[arg(long = "allow-origin", value_name = "PATTERN")]
    pub allowed_origins: Vec<String>,
    /// Issue this many requests first so responses with ids 1..=N settle.
    #[arg(long, default_value_t = 0)]
    pub pending: u64,
    /// Register a push handler for this event (repeatable).
    #[arg(long = "handler", value_name = "EVENT")]
    pub handlers: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReassembleArgs {
    /// JSON-lines file of chunk envelopes, in arrival order.
    pub file: PathBuf,
    /// Where to write the reassembled payload.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Non-blank lines of `path`, numbered from 1.
pub(crate) fn read_json_lines(path: &Path) -> CliResult<Vec<(usize, String)>> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    Ok(text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line.to_string()))
        .collect())
}
