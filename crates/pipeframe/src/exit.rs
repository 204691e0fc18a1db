use std::fmt;
use std::io;

use pipeframe_frame::FrameError;
use pipeframe_process::ProcessError;
use pipeframe_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidPrefix { .. } | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn process_error(context: &str, err: ProcessError) -> CliError {
    match err {
        ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            CliError::new(USAGE, format!("{context}: {source}"))
        }
        ProcessError::Spawn { source, .. } | ProcessError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Protocol(err) => frame_error(context, err),
        TransportError::MalformedPayload(_) | TransportError::Serialize(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::AbnormalExit(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        TransportError::Process(err) => process_error(context, err),
    }
}
