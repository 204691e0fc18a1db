//! `tokio_util::codec` adapter for the varint wire format.
//!
//! Lets the same framing run over any `AsyncRead`/`AsyncWrite`, e.g. the
//! pipes of a `tokio::process::Child`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_varint, encode_varint, FrameConfig};
use crate::error::FrameError;

/// Codec yielding one `Bytes` payload per frame.
#[derive(Debug, Clone, Default)]
pub struct VarintCodec {
    config: FrameConfig,
    pending_length: Option<usize>,
}

impl VarintCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            pending_length: None,
        }
    }
}

impl Decoder for VarintCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.pending_length {
            Some(len) => len,
            None => {
                let Some((value, prefix_len)) = decode_varint(&src[..], self.config.max_prefix_len)?
                else {
                    return Ok(None);
                };
                let max = self.config.max_payload_size;
                let len = usize::try_from(value)
                    .ok()
                    .filter(|len| *len <= max)
                    .ok_or(FrameError::PayloadTooLarge {
                        size: usize::try_from(value).unwrap_or(usize::MAX),
                        max,
                    })?;
                src.advance(prefix_len);
                self.pending_length = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        self.pending_length = None;
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for VarintCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_varint(item.len() as u64, dst);
        dst.put_slice(&item);
        Ok(())
    }
}
