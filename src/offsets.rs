//! Committed-offset storage for consumer groups.
//!
//! The coordination layer does not persist offsets itself; it notifies
//! an external store through this capability. The in-memory
//! implementation backs tests and embedded deployments.

use crate::types::TopicPartition;
use dashmap::DashMap;

/// Holds committed read positions per partition for a consumer group.
pub trait OffsetStore: Send + Sync {
    /// Commit an offset for a partition.
    fn commit(&self, group_id: &str, partition: &TopicPartition, offset: i64);

    /// The last committed offset for a partition, if any.
    fn committed(&self, group_id: &str, partition: &TopicPartition) -> Option<i64>;

    /// All partitions with a committed offset for a group.
    fn partitions(&self, group_id: &str) -> Vec<TopicPartition>;
}

/// Concurrent in-memory offset store.
#[derive(Debug, Default)]
pub struct InMemoryOffsetStore {
    offsets: DashMap<(String, TopicPartition), i64>,
}

impl InMemoryOffsetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed entries across all groups.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl OffsetStore for InMemoryOffsetStore {
    fn commit(&self, group_id: &str, partition: &TopicPartition, offset: i64) {
        self.offsets
            .insert((group_id.to_string(), partition.clone()), offset);
    }

    fn committed(&self, group_id: &str, partition: &TopicPartition) -> Option<i64> {
        self.offsets
            .get(&(group_id.to_string(), partition.clone()))
            .map(|entry| *entry)
    }

    fn partitions(&self, group_id: &str) -> Vec<TopicPartition> {
        self.offsets
            .iter()
            .filter(|entry| entry.key().0 == group_id)
            .map(|entry| entry.key().1.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_fetch() {
        let store = InMemoryOffsetStore::new();
        let tp = TopicPartition::new("orders", 0);

        assert_eq!(store.committed("g1", &tp), None);

        store.commit("g1", &tp, 100);
        assert_eq!(store.committed("g1", &tp), Some(100));

        store.commit("g1", &tp, 150);
        assert_eq!(store.committed("g1", &tp), Some(150));
    }

    #[test]
    fn test_groups_are_isolated() {
        let store = InMemoryOffsetStore::new();
        let tp = TopicPartition::new("orders", 0);

        store.commit("g1", &tp, 10);
        store.commit("g2", &tp, 20);

        assert_eq!(store.committed("g1", &tp), Some(10));
        assert_eq!(store.committed("g2", &tp), Some(20));
    }

    #[test]
    fn test_partitions_listing() {
        let store = InMemoryOffsetStore::new();
        store.commit("g1", &TopicPartition::new("orders", 0), 1);
        store.commit("g1", &TopicPartition::new("orders", 1), 2);
        store.commit("g2", &TopicPartition::new("audit", 0), 3);

        let mut partitions = store.partitions("g1");
        partitions.sort();
        assert_eq!(
            partitions,
            vec![
                TopicPartition::new("orders", 0),
                TopicPartition::new("orders", 1)
            ]
        );
    }
}
