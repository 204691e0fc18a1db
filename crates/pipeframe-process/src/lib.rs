//! Child process control for pipe-based IPC.
//!
//! Spawns a child with its stdin and stdout connected to the parent through
//! pipes and its stderr inherited, reports how it exited, and delivers
//! termination requests. Framing and lifecycle live in higher layers.

pub mod child;
pub mod config;
pub mod error;
pub mod traits;

pub use child::{ChildProcess, ExitCondition};
pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use traits::ProcessControl;
