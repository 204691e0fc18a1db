//! Framed, lifecycle-aware messaging with a child process.
//!
//! Outbound messages are serialized by a [`MessageCodec`] and written to the
//! child's stdin as varint length-prefixed frames; frames read from its stdout
//! are decoded and delivered as [`TransportEvent`]s. The [`Lifecycle`] state
//! gates both directions: after [`Transport::shutdown`] nothing more is sent or
//! delivered, and the child's exit is reported exactly once.
//!
//! [`Transport`] is the I/O-free state machine; [`ProcessTransport`] spawns a
//! child and drives a `Transport` over its pipes.

pub mod error;
pub mod event;
pub mod lifecycle;
pub mod message;
pub mod session;
pub mod transport;

pub use error::{Result, TransportError};
pub use event::{EventSink, FnSink, TransportEvent};
pub use lifecycle::Lifecycle;
pub use message::{CodecError, JsonCodec, MessageCodec, RawCodec};
pub use session::{ProcessTransport, TransportConfig};
pub use transport::Transport;
