use crate::error::Result;

/// Process-control surface the transport layer needs from a child.
///
/// Implemented by [`ChildProcess`](crate::ChildProcess); tests substitute
/// their own implementation to observe termination requests.
pub trait ProcessControl {
    /// OS process identifier.
    fn pid(&self) -> u32;

    /// Ask the process to terminate.
    ///
    /// Sends SIGTERM on Unix. Must succeed quietly if the process is already gone.
    fn terminate(&mut self) -> Result<()>;
}
