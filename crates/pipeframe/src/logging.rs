use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Rendering of diagnostics on stderr.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Minimum severity written to stderr. `off` leaves stderr to the child.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl LogLevel {
    /// Thread names only matter once the stdout reader thread logs, which it
    /// does at trace level.
    fn shows_threads(self) -> bool {
        self == LogLevel::Trace
    }
}

/// Install the stderr subscriber.
///
/// stdout carries frames and command output, and the child inherits our
/// stderr, so every line is written to stderr without ANSI colour.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(level.shows_threads());

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
