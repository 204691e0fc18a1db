use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::iter::FusedIterator;

use bytes::Bytes;

use crate::codec::FrameConfig;
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    ready: VecDeque<Bytes>,
    failed: Option<FrameError>,
    finished: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::with_config(config),
            ready: VecDeque::new(),
            failed: None,
            finished: false,
        }
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }
            if let Some(err) = self.failed.take() {
                return Err(err);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            for frame in self.decoder.feed(&chunk[..read]) {
                match frame {
                    Ok(frame) => self.ready.push_back(frame),
                    Err(err) => self.failed = Some(err),
                }
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.decoder.set_max_payload_size(max_payload_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Bytes>;

    /// Yields frames until the stream closes cleanly between frames.
    ///
    /// A truncated tail or a corrupt stream yields one `Err`, then `None`.
    /// `WouldBlock` and `TimedOut` reads are passed through without ending
    /// iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Some(Err(FrameError::Io(err)))
            }
            Err(err) => {
                self.finished = true;
                let clean = matches!(err, FrameError::ConnectionClosed)
                    && self.decoder.residual_len() == 0
                    && self.decoder.pending_length().is_none();
                if clean {
                    None
                } else {
                    Some(Err(err))
                }
            }
        }
    }
}

impl<T: Read> FusedIterator for FrameReader<T> {}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"hello"])));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"three");
    }

    #[test]
    fn read_frame_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire(&[payload.as_slice()])));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[b"slow", b""]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"slow");
        assert!(reader.read_frame().unwrap().is_empty());
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = vec![16u8];
        partial.extend_from_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn invalid_prefix_in_stream() {
        let bytes = vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::InvalidPrefix { .. }));
    }

    #[test]
    fn frames_before_corruption_are_returned_first() {
        let mut bytes = wire(&[b"good"]);
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"good");
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(vec![0x80, 0x08]), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1024, .. }));
    }

    #[test]
    fn iterator_stops_at_clean_eof() {
        let reader = FrameReader::new(Cursor::new(wire(&[b"a", b"b"])));
        let frames: Vec<Bytes> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(frames, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[test]
    fn iterator_reports_truncated_tail() {
        let mut bytes = wire(&[b"a"]);
        bytes.extend_from_slice(&[0x04, b'x']);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.next().unwrap().unwrap().as_ref(), b"a");
        assert!(matches!(
            reader.next(),
            Some(Err(FrameError::ConnectionClosed))
        ));
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn iterator_ends_after_corrupt_prefix() {
        let mut bytes = vec![0xFF; 6];
        bytes.push(0x01);
        let reader = FrameReader::new(Cursor::new(bytes));

        let items: Vec<Result<Bytes>> = reader.take(10).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(FrameError::InvalidPrefix { .. })));
    }

    #[test]
    fn iterator_survives_would_block() {
        let reader = WouldBlockThenData {
            state: 0,
            bytes: wire(&[b"ok"]),
            pos: 0,
        };
        let items: Vec<Result<Bytes>> = FrameReader::new(reader).collect();

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Err(FrameError::Io(e)) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(items[1].as_ref().unwrap().as_ref(), b"ok");
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(b"ping").unwrap();
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"ping");
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u16 {
                let frame = reader.read_frame().unwrap();
                assert_eq!(frame.as_ref(), format!("msg-{expected}").as_bytes());
            }
        });

        for i in 0..64u16 {
            writer.send(format!("msg-{i}").as_bytes()).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.set_max_payload_size(32);
        assert_eq!(reader.config().max_payload_size, 32);
        let _inner = reader.into_inner();
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = WouldBlockThenData {
            state: 0,
            bytes: wire(&[b"ok"]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[b"ok"])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"ok");
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
