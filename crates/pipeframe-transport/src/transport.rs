//! Lifecycle-aware framing over a child's pipes.
//!
//! [`Transport`] does no I/O scheduling of its own. Its owner delivers inbound
//! chunks, exit notifications and stream errors one at a time; the transport
//! decodes, deserializes and reports them through an [`EventSink`].

use std::io::{self, ErrorKind, Write};

use pipeframe_frame::{FrameConfig, FrameDecoder, FrameError, FrameWriter};
use pipeframe_process::{ExitCondition, ProcessControl};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::event::{EventSink, TransportEvent};
use crate::lifecycle::Lifecycle;
use crate::message::MessageCodec;

/// Single-threaded transport state machine.
///
/// - `C` converts messages to and from frame payloads.
/// - `W` is the child's input stream.
/// - `P` delivers termination requests to the child.
/// - `S` receives [`TransportEvent`]s.
pub struct Transport<C: MessageCodec, W, P, S> {
    codec: C,
    decoder: FrameDecoder,
    writer: FrameWriter<W>,
    process: P,
    sink: S,
    state: Lifecycle,
}

impl<C, W, P, S> Transport<C, W, P, S>
where
    C: MessageCodec,
    W: Write,
    P: ProcessControl,
    S: EventSink<C::Message>,
{
    /// Create an active transport with default frame limits.
    pub fn new(codec: C, writer: W, process: P, sink: S) -> Self {
        Self::with_config(codec, writer, process, sink, FrameConfig::default())
    }

    /// Create an active transport with explicit frame limits for both directions.
    pub fn with_config(codec: C, writer: W, process: P, sink: S, config: FrameConfig) -> Self {
        Self {
            codec,
            decoder: FrameDecoder::with_config(config.clone()),
            writer: FrameWriter::with_config(writer, config),
            process,
            sink,
            state: Lifecycle::Active,
        }
    }

    /// Handle a chunk read from the child's output.
    ///
    /// Chunks arriving after `shutdown()`, after the process ended, or after a
    /// framing error are discarded without being buffered.
    pub fn on_data(&mut self, chunk: &[u8]) {
        if !self.state.is_active() {
            trace!(len = chunk.len(), state = %self.state, "discarding inbound chunk");
            return;
        }
        if self.decoder.is_halted() {
            trace!(len = chunk.len(), "discarding inbound chunk after framing error");
            return;
        }

        for frame in self.decoder.feed(chunk) {
            match frame {
                Ok(payload) => match self.codec.deserialize(payload) {
                    Ok(message) => self.sink.emit(TransportEvent::MessageReceived(message)),
                    Err(err) => {
                        warn!(error = %err, "inbound payload did not deserialize");
                        self.sink
                            .emit(TransportEvent::Error(TransportError::MalformedPayload(err)));
                    }
                },
                Err(err) => {
                    warn!(error = %err, "inbound stream is corrupt; decoding halted");
                    self.sink
                        .emit(TransportEvent::Error(TransportError::Protocol(err)));
                }
            }
        }
    }

    /// Serialize and write one message.
    ///
    /// Equivalent to [`send_with`](Self::send_with) with a callback that does nothing.
    pub fn send(&mut self, message: &C::Message) -> Result<()> {
        self.send_with(message, |_| {})
    }

    /// Serialize and write one message, then report the write outcome to
    /// `on_complete`.
    ///
    /// When the transport is not active this returns `Ok(())` without writing
    /// and without calling `on_complete`. Errors that leave the stream
    /// untouched are returned: a message that fails to serialize, or a
    /// payload above the configured maximum. A failed write goes to
    /// `on_complete` and is also emitted as [`TransportEvent::Error`].
    pub fn send_with<F>(&mut self, message: &C::Message, on_complete: F) -> Result<()>
    where
        F: FnOnce(io::Result<()>),
    {
        if !self.state.is_active() {
            trace!(state = %self.state, "dropping outbound message");
            return Ok(());
        }

        let payload = self
            .codec
            .serialize(message)
            .map_err(TransportError::Serialize)?;

        match self.write_frame(&payload) {
            Ok(()) => {
                trace!(len = payload.len(), "sent frame");
                on_complete(Ok(()));
                Ok(())
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => Err(TransportError::Protocol(err)),
            Err(err) => {
                let err = into_io_error(err);
                warn!(error = %err, "write to child failed");
                on_complete(Err(io::Error::new(err.kind(), err.to_string())));
                self.sink.emit(TransportEvent::Error(TransportError::Io(err)));
                Ok(())
            }
        }
    }

    fn write_frame(&mut self, payload: &[u8]) -> pipeframe_frame::Result<()> {
        self.writer.write_prefix(payload.len())?;
        self.writer.write_payload(payload)
    }

    /// Stop the transport and ask the child to terminate.
    ///
    /// Idempotent. Any partially decoded inbound frame is dropped. The
    /// transport keeps waiting for the process to end, which is then reported
    /// as [`TransportEvent::Exited`] whatever its exit status.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Ok(());
        }

        info!(pid = self.process.pid(), "shutting down transport");
        self.state = Lifecycle::ShuttingDown;
        self.decoder.reset();
        self.process.terminate()?;
        Ok(())
    }

    /// Record that the child has ended. Only the first call has any effect.
    pub fn on_process_exit(&mut self, exit: ExitCondition) {
        match self.state {
            Lifecycle::Exited | Lifecycle::Errored => {
                debug!(%exit, state = %self.state, "ignoring repeated exit notification");
            }
            Lifecycle::ShuttingDown => {
                debug!(%exit, "child exited after shutdown");
                self.state = Lifecycle::Exited;
                self.sink.emit(TransportEvent::Exited);
            }
            Lifecycle::Active if exit.is_clean() => {
                debug!(%exit, "child exited");
                self.state = Lifecycle::Exited;
                self.sink.emit(TransportEvent::Exited);
            }
            Lifecycle::Active => {
                warn!(%exit, "child exited abnormally");
                self.state = Lifecycle::Errored;
                self.sink
                    .emit(TransportEvent::Error(TransportError::AbnormalExit(exit)));
            }
        }
    }

    /// Forward an I/O error from the child's streams.
    ///
    /// Errors are expected while the child is being torn down, so they are
    /// only forwarded while the transport is active.
    pub fn on_io_error(&mut self, err: io::Error) {
        if !self.state.is_active() {
            debug!(error = %err, state = %self.state, "ignoring stream error");
            return;
        }
        self.sink.emit(TransportEvent::Error(TransportError::Io(err)));
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Inbound decoder, e.g. to inspect buffered bytes.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Borrow the child's input stream.
    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut P {
        &mut self.process
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

fn into_io_error(err: FrameError) -> io::Error {
    match err {
        FrameError::Io(err) => err,
        FrameError::ConnectionClosed => io::Error::from(ErrorKind::WriteZero),
        other => io::Error::other(other),
    }
}
