use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Longest accepted length prefix: 5 varint bytes carry a 32-bit length.
pub const MAX_PREFIX_LEN: usize = 5;

/// Longest varint this codec can represent at all (64-bit values).
pub const MAX_VARINT_LEN: usize = 10;

/// Default maximum payload size: anything a 32-bit length can declare.
pub const DEFAULT_MAX_PAYLOAD: usize = u32::MAX as usize;

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u8 = 0x7F;

/// Append `value` to `dst` as an unsigned little-endian base-128 varint.
pub fn encode_varint(mut value: u64, dst: &mut BytesMut) {
    dst.reserve(varint_len(value));
    while value >= u64::from(CONTINUATION) {
        dst.put_u8((value as u8 & DATA_MASK) | CONTINUATION);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `encode_varint` produces for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `buf`, looking at no more than `max_len` bytes.
///
/// Returns `Ok(None)` while the prefix is still incomplete, or
/// `Ok(Some((value, prefix_len)))` once a byte with a clear continuation bit
/// terminates it. A run of `max_len` continuation bytes, or a value wider than
/// `max_len` bytes can hold, is `FrameError::InvalidPrefix`.
pub fn decode_varint(buf: &[u8], max_len: usize) -> Result<Option<(u64, usize)>> {
    let max_len = max_len.clamp(1, MAX_VARINT_LEN);
    let limit = value_limit(max_len);

    let mut value = 0u64;
    for (idx, byte) in buf.iter().take(max_len).enumerate() {
        let data = u64::from(byte & DATA_MASK);
        let shift = 7 * idx as u32;
        if shift >= 64 || (shift > 0 && data > (u64::MAX >> shift)) {
            return Err(FrameError::InvalidPrefix {
                len: idx + 1,
                max: max_len,
            });
        }
        value |= data << shift;

        if byte & CONTINUATION == 0 {
            if value > limit {
                return Err(FrameError::InvalidPrefix {
                    len: idx + 1,
                    max: max_len,
                });
            }
            return Ok(Some((value, idx + 1)));
        }
    }

    if buf.len() >= max_len {
        return Err(FrameError::InvalidPrefix {
            len: max_len,
            max: max_len,
        });
    }
    Ok(None)
}

/// Largest value a prefix of `max_len` bytes may declare. Five bytes is the
/// 32-bit width, not the 35 bits the encoding could hold.
fn value_limit(max_len: usize) -> u64 {
    match max_len {
        n if n >= MAX_VARINT_LEN => u64::MAX,
        MAX_PREFIX_LEN => u64::from(u32::MAX),
        n => (1u64 << (n * 7)) - 1,
    }
}

/// Encode only the length prefix for a payload of `len` bytes.
///
/// Used by writers that emit the prefix and the payload as two separate writes.
pub fn encode_length_prefix(len: usize) -> Result<BytesMut> {
    if len > DEFAULT_MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: DEFAULT_MAX_PAYLOAD,
        });
    }
    let mut prefix = BytesMut::with_capacity(MAX_PREFIX_LEN);
    encode_varint(len as u64, &mut prefix);
    Ok(prefix)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬──────────────────┐
/// │ Length (varint, 1-5B)│ Payload          │
/// │ 7 data bits per byte │ (Length bytes)   │
/// │ high bit = continue  │                  │
/// └──────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let prefix = encode_length_prefix(payload.len())?;
    dst.reserve(prefix.len() + payload.len());
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: `u32::MAX`.
    pub max_payload_size: usize,
    /// Maximum length-prefix width in bytes. Default: 5.
    pub max_prefix_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_prefix_len: MAX_PREFIX_LEN,
        }
    }
}
