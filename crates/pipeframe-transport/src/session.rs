use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::process::ChildStdin;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pipeframe_frame::FrameConfig;
use pipeframe_process::{ChildProcess, ExitCondition, ProcessConfig, ProcessError};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::event::TransportEvent;
use crate::lifecycle::Lifecycle;
use crate::message::MessageCodec;
use crate::transport::Transport;

const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;
const DEFAULT_INBOUND_QUEUE_DEPTH: usize = 16;
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Settings for a [`ProcessTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Frame limits applied to both directions.
    pub frame: FrameConfig,
    /// Size of each read from the child's stdout. Default: 8 KiB.
    pub read_chunk_size: usize,
    /// Chunks read ahead of the owner before the reader thread blocks.
    /// Default: 16.
    ///
    /// Once full, the child's stdout pipe fills and the child blocks on write,
    /// so at most `read_chunk_size * (inbound_queue_depth + 1)` bytes are held
    /// in flight.
    pub inbound_queue_depth: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            inbound_queue_depth: DEFAULT_INBOUND_QUEUE_DEPTH,
        }
    }
}

/// What the reader thread saw on the child's stdout.
enum Inbound {
    Data(Vec<u8>),
    ReadError(io::Error),
    Eof,
}

type Core<C> = Transport<
    C,
    ChildStdin,
    ChildProcess,
    VecDeque<TransportEvent<<C as MessageCodec>::Message>>,
>;

/// A [`Transport`] bound to a spawned child.
///
/// A background thread only moves raw stdout chunks onto a channel. Decoding,
/// deserialization and lifecycle changes all happen on the thread calling
/// [`recv`](Self::recv) and friends, one chunk at a time.
pub struct ProcessTransport<C: MessageCodec> {
    core: Core<C>,
    inbound: Receiver<Inbound>,
    reader: Option<JoinHandle<()>>,
    stdout_closed: bool,
}

impl<C: MessageCodec> ProcessTransport<C> {
    /// Spawn `process` and attach a transport to its pipes.
    pub fn spawn(process: &ProcessConfig, codec: C) -> Result<Self> {
        Self::spawn_with_config(process, codec, TransportConfig::default())
    }

    /// Spawn `process` with explicit transport settings.
    pub fn spawn_with_config(
        process: &ProcessConfig,
        codec: C,
        config: TransportConfig,
    ) -> Result<Self> {
        let mut child = ChildProcess::spawn(process)?;
        let stdin = child.take_stdin()?;
        let stdout = child.take_stdout()?;

        let (tx, rx) = mpsc::sync_channel(config.inbound_queue_depth.max(1));
        let chunk_size = config.read_chunk_size.max(1);
        let reader = thread::Builder::new()
            .name(format!("pipeframe-reader-{}", child.pid()))
            .spawn(move || read_loop(stdout, tx, chunk_size))?;

        Ok(Self {
            core: Transport::with_config(codec, stdin, child, VecDeque::new(), config.frame),
            inbound: rx,
            reader: Some(reader),
            stdout_closed: false,
        })
    }

    /// Block until the next event.
    ///
    /// Returns `None` once the terminal event has been delivered.
    pub fn recv(&mut self) -> Option<TransportEvent<C::Message>> {
        self.next_event(None)
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout or once the terminal event has been delivered;
    /// [`state`](Self::state) tells the two apart.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<TransportEvent<C::Message>> {
        self.next_event(Some(Instant::now() + timeout))
    }

    /// Return an event only if one is ready without waiting.
    pub fn try_recv(&mut self) -> Option<TransportEvent<C::Message>> {
        self.next_event(Some(Instant::now()))
    }

    fn next_event(&mut self, deadline: Option<Instant>) -> Option<TransportEvent<C::Message>> {
        loop {
            if let Some(event) = self.core.sink_mut().pop_front() {
                return Some(event);
            }
            if self.core.state().is_terminal() {
                return None;
            }

            if self.stdout_closed {
                let exit = self.reap(deadline)?;
                self.core.on_process_exit(exit);
                continue;
            }

            match self.next_inbound(deadline)? {
                Inbound::Data(chunk) => self.core.on_data(&chunk),
                Inbound::ReadError(err) => self.core.on_io_error(err),
                Inbound::Eof => self.close_stdout(),
            }
        }
    }

    fn next_inbound(&mut self, deadline: Option<Instant>) -> Option<Inbound> {
        let received = match deadline {
            None => self.inbound.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if timeout.is_zero() {
                    self.inbound.try_recv().map_err(|err| match err {
                        TryRecvError::Empty => RecvTimeoutError::Timeout,
                        TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
                    })
                } else {
                    self.inbound.recv_timeout(timeout)
                }
            }
        };

        match received {
            Ok(inbound) => Some(inbound),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Inbound::Eof),
        }
    }

    fn close_stdout(&mut self) {
        debug!(pid = self.pid(), "child stdout closed");
        self.stdout_closed = true;
        if let Some(reader) = self.reader.take() {
            join_reader(reader, self.pid());
        }
    }

    /// Wait for the child after its stdout closed. `None` means the deadline passed.
    fn reap(&mut self, deadline: Option<Instant>) -> Option<ExitCondition> {
        let child = self.core.process_mut();
        let waited = match deadline {
            None => child.wait().map(Some),
            Some(deadline) => loop {
                match child.try_wait() {
                    Ok(Some(exit)) => break Ok(Some(exit)),
                    Ok(None) if Instant::now() >= deadline => break Ok(None),
                    Ok(None) => thread::sleep(REAP_POLL_INTERVAL),
                    Err(err) => break Err(err),
                }
            },
        };

        match waited {
            Ok(exit) => exit,
            Err(err) => {
                let err = match err {
                    ProcessError::Io(err) => err,
                    other => io::Error::other(other),
                };
                self.core.on_io_error(err);
                Some(ExitCondition::Unknown)
            }
        }
    }

    /// Serialize and write one message to the child's stdin.
    pub fn send(&mut self, message: &C::Message) -> Result<()> {
        self.core.send(message)
    }

    /// Like [`send`](Self::send), reporting the write outcome to `on_complete`.
    pub fn send_with<F>(&mut self, message: &C::Message, on_complete: F) -> Result<()>
    where
        F: FnOnce(io::Result<()>),
    {
        self.core.send_with(message, on_complete)
    }

    /// Stop processing and signal the child to terminate.
    ///
    /// Keep calling [`recv`](Self::recv) to observe the final
    /// [`TransportEvent::Exited`].
    pub fn shutdown(&mut self) -> Result<()> {
        self.core.shutdown()
    }

    pub fn state(&self) -> Lifecycle {
        self.core.state()
    }

    /// OS process identifier of the child.
    pub fn pid(&self) -> u32 {
        self.core.process().pid()
    }

    pub fn codec(&self) -> &C {
        self.core.codec()
    }
}

/// Returns `false` if the reader thread panicked.
fn join_reader(reader: JoinHandle<()>, pid: u32) -> bool {
    let joined = reader.join().is_ok();
    if !joined {
        warn!(pid, "stdout reader thread panicked");
    }
    joined
}

/// Forward stdout chunks until EOF, a read error, or the receiver goes away.
///
/// `tx` is bounded, so a slow owner stalls this loop and the child's writes
/// back up in the pipe.
fn read_loop<R: Read>(mut stdout: R, tx: SyncSender<Inbound>, chunk_size: usize) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let inbound = match stdout.read(&mut buf) {
            Ok(0) => Inbound::Eof,
            Ok(n) => {
                trace!(len = n, "read chunk from child");
                Inbound::Data(buf[..n].to_vec())
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => Inbound::ReadError(err),
        };

        let done = !matches!(inbound, Inbound::Data(_));
        if tx.send(inbound).is_err() || done {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Never reaches EOF; counts how many reads were made.
    struct Endless {
        reads: Arc<AtomicUsize>,
    }

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            buf.fill(0);
            Ok(buf.len())
        }
    }

    #[test]
    fn reader_stalls_when_queue_is_full() {
        let reads = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::sync_channel(2);
        let source = Endless {
            reads: reads.clone(),
        };
        let reader = thread::spawn(move || read_loop(source, tx, 64));

        thread::sleep(Duration::from_millis(200));
        // Two queued chunks plus one blocked in `send`.
        assert_eq!(reads.load(Ordering::SeqCst), 3);

        // Draining one slot lets exactly one more read through.
        assert!(matches!(rx.recv(), Ok(Inbound::Data(chunk)) if chunk.len() == 64));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(reads.load(Ordering::SeqCst), 4);

        drop(rx);
        assert!(join_reader(reader, 0));
    }

    #[test]
    fn reader_forwards_data_then_eof() {
        let (tx, rx) = mpsc::sync_channel(1);
        let reader = thread::spawn(move || read_loop(&b"hello"[..], tx, 3));

        assert!(matches!(rx.recv(), Ok(Inbound::Data(chunk)) if chunk == b"hel"));
        assert!(matches!(rx.recv(), Ok(Inbound::Data(chunk)) if chunk == b"lo"));
        assert!(matches!(rx.recv(), Ok(Inbound::Eof)));
        assert!(join_reader(reader, 0));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn panicked_reader_is_reported() {
        let reader = thread::spawn(|| panic!("reader failed"));
        assert!(!join_reader(reader, 0));
    }
}
