use std::path::PathBuf;

/// Errors that can occur while controlling a child process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Failed to spawn the executable.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// A stdio pipe was not available (already taken or not configured).
    #[error("child {0} pipe not available")]
    MissingPipe(&'static str),

    /// Failed to deliver a termination signal.
    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: u32, source: std::io::Error },

    /// An I/O error occurred while waiting on the process.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessError>;
