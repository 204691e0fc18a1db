//! Varint length-prefixed message framing for byte-oriented pipes.
//!
//! This is the leaf layer of pipeframe. Every message is framed as:
//! - An unsigned little-endian base-128 varint payload length (1-5 bytes)
//! - The payload bytes
//!
//! [`FrameDecoder`] reconstructs frames from arbitrarily chunked input with
//! no I/O of its own; [`FrameReader`] and [`FrameWriter`] drive it over
//! blocking `Read`/`Write` streams.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::VarintCodec;
pub use codec::{
    decode_varint, encode_frame, encode_length_prefix, encode_varint, varint_len, FrameConfig,
    DEFAULT_MAX_PAYLOAD, MAX_PREFIX_LEN, MAX_VARINT_LEN,
};
pub use decoder::{Decoded, FrameDecoder, Frames};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
