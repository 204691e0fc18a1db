/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is longer than the supported varint width, or its
    /// value does not fit in it.
    #[error("invalid length prefix ({len} bytes, max {max})")]
    InvalidPrefix { len: usize, max: usize },

    /// The declared or supplied payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The decoder hit a fatal error earlier and must be reset before reuse.
    #[error("decoder halted after a previous framing error")]
    Halted,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Returns true for errors after which the byte stream can no longer be trusted.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidPrefix { .. } | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
