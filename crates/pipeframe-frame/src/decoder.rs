//! Streaming frame decoder.
//!
//! Turns an arbitrarily chunked byte stream into discrete payloads. Decoding
//! is a two-phase state machine per frame: read a varint length prefix, then
//! wait until that many payload bytes are available. Frames complete eagerly
//! within the call that supplies their last byte.

use std::ops::Range;

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::codec::{decode_varint, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Result of scanning a caller-owned buffer with [`FrameDecoder::feed_and_consume`].
#[derive(Debug, Default)]
pub struct Decoded {
    /// Payload ranges within the scanned buffer, in arrival order.
    pub frames: Vec<Range<usize>>,
    /// Bytes at the front of the buffer the caller may now drop.
    pub consumed: usize,
    /// Fatal framing error hit after `frames` were decoded.
    pub error: Option<FrameError>,
}

/// Frames completed by a single [`FrameDecoder::feed`] call.
///
/// Yields each payload in order. If the stream turned out to be corrupt, the
/// frames decoded before the corruption come first and a single `Err` is the
/// last item.
#[derive(Debug)]
pub struct Frames {
    frames: std::vec::IntoIter<Bytes>,
    error: Option<FrameError>,
}

impl Frames {
    fn new(frames: Vec<Bytes>, error: Option<FrameError>) -> Self {
        Self {
            frames: frames.into_iter(),
            error,
        }
    }
}

impl Iterator for Frames {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.frames.next() {
            Some(frame) => Some(Ok(frame)),
            None => self.error.take().map(Err),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.frames.len() + usize::from(self.error.is_some());
        (len, Some(len))
    }
}

impl ExactSizeIterator for Frames {}

/// Incremental decoder for `[varint length][payload]` frames.
///
/// Residual bytes (an incomplete prefix or payload) stay inside the decoder
/// between calls; completed payloads are split off without copying.
#[derive(Debug)]
pub struct FrameDecoder {
    pending_length: Option<usize>,
    residual: BytesMut,
    config: FrameConfig,
    halted: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            pending_length: None,
            residual: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            halted: false,
        }
    }

    /// Feed a chunk and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames {
        if self.halted {
            return Frames::new(Vec::new(), Some(FrameError::Halted));
        }

        let mut buf = std::mem::take(&mut self.residual);
        buf.extend_from_slice(chunk);

        let decoded = self.feed_and_consume(&buf);
        let head = buf.split_to(decoded.consumed).freeze();
        self.residual = buf;

        let frames = decoded
            .frames
            .into_iter()
            .map(|range| head.slice(range))
            .collect();
        Frames::new(frames, decoded.error)
    }

    /// Scan a caller-owned buffer.
    ///
    /// Decode state (`pending_length`) carries over between calls, but the
    /// bytes do not: the caller must keep everything past `consumed` and pass
    /// it again, with new data appended, on the next call. A partially
    /// available payload is never consumed.
    pub fn feed_and_consume(&mut self, buf: &[u8]) -> Decoded {
        let mut decoded = Decoded::default();
        if self.halted {
            decoded.error = Some(FrameError::Halted);
            return decoded;
        }

        let mut cursor = 0usize;
        loop {
            let len = match self.pending_length {
                Some(len) => len,
                None => match self.read_prefix(&buf[cursor..]) {
                    Ok(Some((len, prefix_len))) => {
                        cursor += prefix_len;
                        self.pending_length = Some(len);
                        len
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, offset = cursor, "framing error; halting decoder");
                        self.halted = true;
                        decoded.error = Some(err);
                        break;
                    }
                },
            };

            if buf.len() - cursor < len {
                break;
            }

            trace!(payload_len = len, "decoded frame");
            decoded.frames.push(cursor..cursor + len);
            cursor += len;
            self.pending_length = None;
        }

        decoded.consumed = cursor;
        decoded
    }

    fn read_prefix(&self, buf: &[u8]) -> Result<Option<(usize, usize)>> {
        let Some((value, prefix_len)) = decode_varint(buf, self.config.max_prefix_len)? else {
            return Ok(None);
        };

        let max = self.config.max_payload_size;
        match usize::try_from(value) {
            Ok(len) if len <= max => Ok(Some((len, prefix_len))),
            _ => Err(FrameError::PayloadTooLarge {
                size: usize::try_from(value).unwrap_or(usize::MAX),
                max,
            }),
        }
    }

    /// Length of the frame currently being assembled, if its prefix has been read.
    pub fn pending_length(&self) -> Option<usize> {
        self.pending_length
    }

    /// Bytes received but not yet part of a completed frame.
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }

    /// Returns true once a framing error has stopped decoding.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Discard all decode state, including a halt caused by an earlier error.
    pub fn reset(&mut self) {
        self.pending_length = None;
        self.residual.clear();
        self.halted = false;
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
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

    fn collect(frames: Frames) -> Vec<Bytes> {
        frames.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn hello_split_across_two_chunks() {
        let mut decoder = FrameDecoder::new();

        let first = collect(decoder.feed(&[0x05, b'h', b'e']));
        assert!(first.is_empty());
        assert_eq!(decoder.pending_length(), Some(5));

        let second = collect(decoder.feed(b"llo"));
        assert_eq!(second, vec![Bytes::from_static(b"hello")]);
        assert_eq!(decoder.pending_length(), None);
        assert_eq!(decoder.residual_len(), 0);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = collect(decoder.feed(&wire(&[b"first", b"second"])));
        assert_eq!(
            frames,
            vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]
        );
    }

    #[test]
    fn zero_length_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = collect(decoder.feed(&[0x00]));
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
        assert_eq!(decoder.residual_len(), 0);
    }

    #[test]
    fn zero_length_frame_does_not_consume_next_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = collect(decoder.feed(&[0x00, 0x02, b'o']));
        assert_eq!(frames, vec![Bytes::new()]);
        assert_eq!(decoder.pending_length(), Some(2));

        let frames = collect(decoder.feed(b"k"));
        assert_eq!(frames, vec![Bytes::from_static(b"ok")]);
    }

    #[test]
    fn chunk_without_complete_frame_is_retained() {
        let mut decoder = FrameDecoder::new();
        assert!(collect(decoder.feed(&[0x03, b'a'])).is_empty());
        assert_eq!(decoder.residual_len(), 1);
    }

    #[test]
    fn split_inside_length_prefix() {
        let payload = vec![0x5A; 300];
        let bytes = wire(&[payload.as_slice()]);
        assert_eq!(&bytes[..2], &[0xAC, 0x02]);

        let mut decoder = FrameDecoder::new();
        assert!(collect(decoder.feed(&bytes[..1])).is_empty());
        assert_eq!(decoder.pending_length(), None);

        let frames = collect(decoder.feed(&bytes[1..]));
        assert_eq!(frames, vec![Bytes::from(payload)]);
    }

    #[test]
    fn partial_prefix_then_rest_matches_whole_feed() {
        let first = [0x11u8; 200];
        let bytes = wire(&[&first[..], b"tail"]);

        let mut whole = FrameDecoder::new();
        let expected = collect(whole.feed(&bytes));

        let mut split = FrameDecoder::new();
        let mut actual = collect(split.feed(&bytes[..1]));
        actual.extend(collect(split.feed(&bytes[1..])));

        assert_eq!(actual, expected);
    }

    #[test]
    fn every_split_point_yields_same_frames() {
        let payloads: [&[u8]; 4] = [b"alpha", b"", &[0xEE; 140], b"omega"];
        let bytes = wire(&payloads);
        let expected: Vec<Bytes> = payloads.iter().map(|p| Bytes::copy_from_slice(p)).collect();

        for first in 0..=bytes.len() {
            for second in first..=bytes.len() {
                let mut decoder = FrameDecoder::new();
                let mut frames = collect(decoder.feed(&bytes[..first]));
                frames.extend(collect(decoder.feed(&bytes[first..second])));
                frames.extend(collect(decoder.feed(&bytes[second..])));
                assert_eq!(frames, expected, "split at {first}/{second}");
                assert_eq!(decoder.residual_len(), 0);
            }
        }
    }

    #[test]
    fn byte_at_a_time() {
        let bytes = wire(&[b"one", b"two", b"three"]);
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in &bytes {
            frames.extend(collect(decoder.feed(std::slice::from_ref(byte))));
        }
        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"one"),
                Bytes::from_static(b"two"),
                Bytes::from_static(b"three"),
            ]
        );
    }

    #[test]
    fn overlong_prefix_is_invalid_and_halts() {
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.feed(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(
            frames.next(),
            Some(Err(FrameError::InvalidPrefix { .. }))
        ));
        assert!(frames.next().is_none());
        assert!(decoder.is_halted());

        let mut again = decoder.feed(&[0x01, b'x']);
        assert!(matches!(again.next(), Some(Err(FrameError::Halted))));
    }

    #[test]
    fn frames_before_corruption_are_still_yielded() {
        let mut bytes = wire(&[b"good"]);
        bytes.extend_from_slice(&[0x80, 0x80, 0x80, 0x80, 0x80]);

        let mut decoder = FrameDecoder::new();
        let items: Vec<_> = decoder.feed(&bytes).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().as_ref(), b"good");
        assert!(matches!(items[1], Err(FrameError::InvalidPrefix { .. })));
    }

    #[test]
    fn declared_length_above_limit_is_rejected() {
        let config = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut decoder = FrameDecoder::with_config(config);
        let mut frames = decoder.feed(&[0x20]);
        assert!(matches!(
            frames.next(),
            Some(Err(FrameError::PayloadTooLarge { size: 32, max: 16 }))
        ));
    }

    #[test]
    fn reset_clears_halt_and_residual() {
        let mut decoder = FrameDecoder::new();
        let _ = decoder.feed(&[0x80, 0x80, 0x80, 0x80, 0x80]).count();
        assert!(decoder.is_halted());

        decoder.reset();
        assert!(!decoder.is_halted());
        assert_eq!(decoder.residual_len(), 0);
        let frames = collect(decoder.feed(&[0x01, b'x']));
        assert_eq!(frames, vec![Bytes::from_static(b"x")]);
    }

    #[test]
    fn feed_and_consume_leaves_partial_payload() {
        let mut decoder = FrameDecoder::new();
        let buf = [0x02, b'a', b'b', 0x03, b'c'];

        let decoded = decoder.feed_and_consume(&buf);
        assert_eq!(decoded.frames, vec![1..3]);
        assert_eq!(decoded.consumed, 4);
        assert!(decoded.error.is_none());
        assert_eq!(decoder.pending_length(), Some(3));

        // Caller re-delivers the unconsumed tail with the new bytes appended.
        let decoded = decoder.feed_and_consume(b"cde");
        assert_eq!(decoded.frames, vec![0..3]);
        assert_eq!(decoded.consumed, 3);
    }

    #[test]
    fn feed_and_consume_incomplete_prefix_consumes_nothing() {
        let mut decoder = FrameDecoder::new();
        let decoded = decoder.feed_and_consume(&[0x80]);
        assert!(decoded.frames.is_empty());
        assert_eq!(decoded.consumed, 0);
        assert_eq!(decoder.pending_length(), None);
    }

    #[test]
    fn feed_and_consume_returns_frames_before_error() {
        let mut decoder = FrameDecoder::new();
        let mut buf = wire(&[b"ok"]);
        buf.extend_from_slice(&[0xFF; 6]);

        let decoded = decoder.feed_and_consume(&buf);
        assert_eq!(decoded.frames, vec![1..3]);
        assert_eq!(decoded.consumed, 3);
        assert!(matches!(decoded.error, Some(FrameError::InvalidPrefix { .. })));
        assert!(decoder.is_halted());

        let decoded = decoder.feed_and_consume(&wire(&[b"late"]));
        assert!(decoded.frames.is_empty());
        assert!(matches!(decoded.error, Some(FrameError::Halted)));
    }

    #[test]
    fn first_feed_keeps_preallocated_buffer() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.residual.capacity() >= INITIAL_BUFFER_CAPACITY);

        let frames = collect(decoder.feed(&[0x05, b'h', b'e']));
        assert!(frames.is_empty());
        // The tail of the original allocation is still the residual.
        assert!(decoder.residual.capacity() >= INITIAL_BUFFER_CAPACITY - 3);
    }

    #[test]
    fn residual_stays_bounded_by_one_frame() {
        let mut decoder = FrameDecoder::new();
        let payload = [7u8; 64];
        let payloads = vec![&payload[..]; 100];
        let bytes = wire(&payloads);
        for chunk in bytes.chunks(37) {
            let _ = collect(decoder.feed(chunk));
            assert!(decoder.residual_len() < 64 + 2);
        }
        assert_eq!(decoder.residual_len(), 0);
    }

    #[test]
    fn frames_iterator_reports_exact_len() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&wire(&[b"a", b"b", b"c"]));
        assert_eq!(frames.len(), 3);
    }
}
