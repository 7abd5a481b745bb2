//! Message headers and reserved routing keys.
//!
//! Headers are string key-value metadata attached to each record,
//! independent of the payload encoding. Two reserved keys carry
//! multi-tenancy routing metadata; the coordination layer passes them
//! through verbatim and never interprets them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved header key identifying the tenant a record belongs to.
pub const TENANT_ID: &str = "tenantId";

/// Reserved header key identifying the producing source.
pub const SOURCE_ID: &str = "sourceId";

/// Header map attached to a record.
///
/// Keys are ordered so serialized form is stable. Reserved keys must
/// survive a serialize/deserialize round trip byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header map with tenant and source routing metadata.
    pub fn with_routing(tenant_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        let mut headers = Self::new();
        headers.insert(TENANT_ID, tenant_id);
        headers.insert(SOURCE_ID, source_id);
        headers
    }

    /// Insert a header, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a header value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The tenant id, if present.
    pub fn tenant_id(&self) -> Option<&str> {
        self.get(TENANT_ID)
    }

    /// The source id, if present.
    pub fn source_id(&self) -> Option<&str> {
        self.get(SOURCE_ID)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over headers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_headers() {
        let headers = Headers::with_routing("T1", "S9");
        assert_eq!(headers.tenant_id(), Some("T1"));
        assert_eq!(headers.source_id(), Some("S9"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_insert_replaces() {
        let mut headers = Headers::new();
        headers.insert("trace", "a");
        headers.insert("trace", "b");
        assert_eq!(headers.get("trace"), Some("b"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_iteration_order() {
        let mut headers = Headers::new();
        headers.insert("z", "1");
        headers.insert("a", "2");
        let keys: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
