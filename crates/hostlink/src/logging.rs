use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with a full filter directive when set.
pub const LOG_FILTER_ENV: &str = "HOSTLINK_LOG";

/// Library targets that `--log-level` applies to.
const HOSTLINK_TARGETS: &[&str] = &[
    "hostlink",
    "hostlink_wire",
    "hostlink_transport",
    "hostlink_channel",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directive: hostlink crates at `level`, everything else at warn.
pub fn default_directives(level: LogLevel) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        HOSTLINK_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.as_str())),
    );
    directives.join(",")
}

fn build_filter(level: LogLevel) -> EnvFilter {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .unwrap_or_else(|err| {
                eprintln!("warning: ignoring invalid {LOG_FILTER_ENV}: {err}");
                EnvFilter::new(default_directives(level))
            }),
        _ => EnvFilter::new(default_directives(level)),
    }
}

/// Install the stderr subscriber. Logs never go to stdout, which carries
/// replay and reassembly results.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
