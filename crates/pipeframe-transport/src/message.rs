//! Serialization contract between frames and structured messages.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Errors raised by a [`MessageCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from a caller-supplied codec.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// Converts between messages and frame payloads.
///
/// The transport never looks inside a payload; whatever implements this trait
/// defines the message schema.
pub trait MessageCodec {
    type Message;

    fn serialize(&self, message: &Self::Message) -> Result<Bytes, CodecError>;

    /// Fails when the payload does not match the expected message schema.
    fn deserialize(&self, payload: Bytes) -> Result<Self::Message, CodecError>;
}

/// JSON payloads via serde_json.
pub struct JsonCodec<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T: Serialize + DeserializeOwned> MessageCodec for JsonCodec<T> {
    type Message = T;

    fn serialize(&self, message: &T) -> Result<Bytes, CodecError> {
        let json = serde_json::to_vec(message)?;
        tracing::trace!(json_size_bytes = json.len(), "encoded message");
        Ok(Bytes::from(json))
    }

    fn deserialize(&self, payload: Bytes) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(&payload)?)
    }
}

/// Passes payloads through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl MessageCodec for RawCodec {
    type Message = Bytes;

    fn serialize(&self, message: &Bytes) -> Result<Bytes, CodecError> {
        Ok(message.clone())
    }

    fn deserialize(&self, payload: Bytes) -> Result<Bytes, CodecError> {
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum Command {
        Move { x: i32, y: i32 },
        Stop,
    }

    #[test]
    fn json_roundtrip() {
        let codec = JsonCodec::<Command>::new();
        for message in [Command::Move { x: -3, y: 7 }, Command::Stop] {
            let payload = codec.serialize(&message).unwrap();
            assert_eq!(codec.deserialize(payload).unwrap(), message);
        }
    }

    #[test]
    fn json_wire_shape() {
        let codec = JsonCodec::<Command>::new();
        let payload = codec.serialize(&Command::Stop).unwrap();
        assert_eq!(payload.as_ref(), br#"{"type":"stop"}"#);
    }

    #[test]
    fn json_rejects_schema_mismatch() {
        let codec = JsonCodec::<Command>::new();
        let err = codec
            .deserialize(Bytes::from_static(br#"{"type":"jump"}"#))
            .unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn raw_passthrough_shares_buffer() {
        let payload = Bytes::from_static(b"\x00\x01binary");
        let codec = RawCodec;
        let out = codec.deserialize(payload.clone()).unwrap();
        assert_eq!(out, payload);
        assert_eq!(codec.serialize(&out).unwrap(), payload);
    }
}
