//! Pluggable payload encoding boundary.
//!
//! The surrounding client accepts one serializer per message type at
//! construction time and invokes it once per outbound message, off the
//! rebalance coordinator's critical path. An encoding failure is
//! scoped to the single message that caused it; it never perturbs
//! coordinator state.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors raised at the serialization boundary.
#[derive(Error, Debug, Clone)]
pub enum EncodingError {
    /// Failed to encode an outbound record envelope.
    #[error("failed to serialize message for topic {topic}: {detail}")]
    Serialize {
        /// Topic the offending message was destined for.
        topic: String,
        /// Underlying encoder diagnostic.
        detail: String,
    },

    /// Failed to encode a typed payload, before it is bound to a topic.
    #[error("failed to serialize payload: {detail}")]
    SerializePayload {
        /// Underlying encoder diagnostic.
        detail: String,
    },

    /// Failed to decode an inbound payload.
    #[error("failed to deserialize payload: {detail}")]
    Deserialize {
        /// Underlying decoder diagnostic.
        detail: String,
    },
}

/// Encodes messages of type `P` into bytes.
pub trait MessageSerializer<P>: Send + Sync {
    /// Serialize a message to its wire form.
    fn serialize(&self, message: &P) -> Result<Bytes, EncodingError>;
}

/// Decodes payload bytes back into messages of type `P`.
///
/// Symmetric counterpart of [`MessageSerializer`], consumed by the
/// fetch side of the pipeline.
pub trait MessageDeserializer<P>: Send + Sync {
    /// Deserialize a message from its wire form.
    fn deserialize(&self, data: &[u8]) -> Result<P, EncodingError>;
}

/// Bincode-backed serializer for any serde-serializable message type.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeSerializer<P> {
    _marker: PhantomData<fn(P)>,
}

impl<P> BincodeSerializer<P> {
    /// Create a new bincode serializer.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<P: Serialize + Send + Sync> MessageSerializer<P> for BincodeSerializer<P> {
    fn serialize(&self, message: &P) -> Result<Bytes, EncodingError> {
        bincode::serialize(message)
            .map(Bytes::from)
            .map_err(|e| EncodingError::SerializePayload {
                detail: e.to_string(),
            })
    }
}

/// Bincode-backed deserializer for any serde-deserializable type.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeDeserializer<P> {
    _marker: PhantomData<fn() -> P>,
}

impl<P> BincodeDeserializer<P> {
    /// Create a new bincode deserializer.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<P: DeserializeOwned + Send + Sync> MessageDeserializer<P> for BincodeDeserializer<P> {
    fn deserialize(&self, data: &[u8]) -> Result<P, EncodingError> {
        bincode::deserialize(data).map_err(|e| EncodingError::Deserialize {
            detail: e.to_string(),
        })
    }
}

/// Pass-through serializer for payloads that are already bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytesSerializer;

impl MessageSerializer<Bytes> for RawBytesSerializer {
    fn serialize(&self, message: &Bytes) -> Result<Bytes, EncodingError> {
        Ok(message.clone())
    }
}

impl MessageDeserializer<Bytes> for RawBytesSerializer {
    fn deserialize(&self, data: &[u8]) -> Result<Bytes, EncodingError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PageView {
        user: String,
        count: u32,
    }

    #[test]
    fn test_bincode_roundtrip() {
        let serializer = BincodeSerializer::<PageView>::new();
        let deserializer = BincodeDeserializer::<PageView>::new();

        let message = PageView {
            user: "u-17".to_string(),
            count: 4,
        };

        let bytes = serializer.serialize(&message).unwrap();
        let decoded = deserializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_raw_bytes_passthrough() {
        let codec = RawBytesSerializer;
        let payload = Bytes::from_static(b"opaque");
        let encoded = codec.serialize(&payload).unwrap();
        assert_eq!(encoded, payload);
        assert_eq!(codec.deserialize(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_deserialize_failure_is_scoped() {
        let deserializer = BincodeDeserializer::<PageView>::new();
        let err = deserializer.deserialize(&[0x01]).unwrap_err();
        assert!(matches!(err, EncodingError::Deserialize { .. }));
    }
}
