//! Record envelope carried through the fetch and produce pipelines.

use crate::headers::Headers;
use crate::serialization::EncodingError;
use crate::types::TopicPartition;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record with its log coordinates, headers, and payload.
///
/// The payload is opaque bytes; typed encoding and decoding happen at
/// the serialization boundary. Headers travel with the record and are
/// preserved verbatim through the envelope encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Topic this record belongs to.
    pub topic: String,

    /// Partition index within the topic.
    pub partition: u32,

    /// Offset within the partition, if already appended.
    pub offset: Option<i64>,

    /// Optional routing key.
    pub key: Option<Bytes>,

    /// Header metadata, passed through unmodified.
    pub headers: Headers,

    /// Encoded payload.
    pub payload: Bytes,
}

impl Record {
    /// Create a record for the given topic and payload.
    pub fn new(topic: impl Into<String>, partition: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: None,
            key: None,
            headers: Headers::new(),
            payload: payload.into(),
        }
    }

    /// Attach headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Attach a routing key.
    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the log offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The partition this record belongs to.
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// Encode the envelope to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        bincode::serialize(self).map_err(|e| EncodingError::Serialize {
            topic: self.topic.clone(),
            detail: e.to_string(),
        })
    }

    /// Decode an envelope from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, EncodingError> {
        bincode::deserialize(data).map_err(|e| EncodingError::Deserialize {
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = Record::new("audit", 2, Bytes::from_static(b"payload"))
            .with_key(Bytes::from_static(b"k1"))
            .with_offset(41);

        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_routing_headers_survive_roundtrip() {
        let record = Record::new("audit", 0, Bytes::from_static(b"x"))
            .with_headers(Headers::with_routing("T1", "S9"));

        let decoded = Record::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.headers.tenant_id(), Some("T1"));
        assert_eq!(decoded.headers.source_id(), Some("S9"));
        assert_eq!(decoded.headers, record.headers);
    }

    #[test]
    fn test_topic_partition_accessor() {
        let record = Record::new("orders", 5, Bytes::new());
        assert_eq!(record.topic_partition(), TopicPartition::new("orders", 5));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = Record::from_bytes(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, EncodingError::Deserialize { .. }));
    }
}
