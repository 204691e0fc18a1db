use pipeframe_frame::FrameError;
use pipeframe_process::{ExitCondition, ProcessError};

use crate::message::CodecError;

/// Errors surfaced by a transport, either returned directly or carried by
/// [`TransportEvent::Error`](crate::TransportEvent::Error).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The inbound byte stream is no longer correctly framed (bad length
    /// prefix or oversized frame). Decoding stops for good.
    #[error("protocol error: {0}")]
    Protocol(#[source] FrameError),

    /// A well-framed payload did not deserialize into a message.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[source] CodecError),

    /// An outbound message could not be serialized; nothing was written.
    #[error("failed to serialize message: {0}")]
    Serialize(#[source] CodecError),

    /// I/O failure on the child's pipes.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child terminated on its own with a non-zero code or a signal.
    #[error("process exited abnormally ({0})")]
    AbnormalExit(ExitCondition),

    /// Spawning or signalling the child failed.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
