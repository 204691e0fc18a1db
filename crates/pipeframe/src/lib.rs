//! Varint length-prefixed messaging with a child process.
//!
//! pipeframe frames structured messages over a child's stdin and stdout,
//! tolerating any chunking of the byte stream, and reports how the child's
//! lifecycle ended.
//!
//! # Crate Structure
//!
//! - [`frame`]: Varint length prefixes and the streaming frame decoder
//! - [`process`]: Spawning and signalling the child process
//! - [`transport`]: Lifecycle-aware message transport over the child's pipes

/// Re-export frame types.
pub mod frame {
    pub use pipeframe_frame::*;
}

/// Re-export process types.
pub mod process {
    pub use pipeframe_process::*;
}

/// Re-export transport types.
pub mod transport {
    pub use pipeframe_transport::*;
}
