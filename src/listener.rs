//! Rebalance listener capability and stock implementations.
//!
//! A listener is notified when the set of partitions owned by this
//! member changes. Both callbacks run synchronously inside the poll
//! call that applies the rebalance, never concurrently with each other
//! or with record delivery.
//!
//! The group protocol guarantees that every member's
//! [`on_partitions_revoked`](RebalanceListener::on_partitions_revoked)
//! completes, group-wide, before any member's
//! [`on_partitions_assigned`](RebalanceListener::on_partitions_assigned)
//! begins. State saved during revocation is therefore visible to the
//! member that takes the partition over.

use crate::error::ListenerError;
use crate::offsets::OffsetStore;
use crate::types::{PartitionSet, TopicPartition};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Callbacks invoked around a partition reassignment.
pub trait RebalanceListener: Send + Sync {
    /// Called with the partitions about to be taken away, after
    /// fetching has stopped for them and before the new assignment is
    /// installed. Commit offsets or flush state for exactly these
    /// partitions here. Not called on final shutdown.
    fn on_partitions_revoked(&self, partitions: &PartitionSet) -> Result<(), ListenerError>;

    /// Called with the full new assignment (which may overlap the
    /// previous one) after group-wide reassignment completes and
    /// before fetching resumes. Seek to saved offsets here.
    fn on_partitions_assigned(&self, partitions: &PartitionSet) -> Result<(), ListenerError>;
}

/// Listener that ignores all rebalance events.
#[derive(Debug, Default)]
pub struct NoopRebalanceListener;

impl RebalanceListener for NoopRebalanceListener {
    fn on_partitions_revoked(&self, _partitions: &PartitionSet) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_partitions_assigned(&self, _partitions: &PartitionSet) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Listener that logs rebalance events.
#[derive(Debug, Default)]
pub struct LoggingRebalanceListener;

impl RebalanceListener for LoggingRebalanceListener {
    fn on_partitions_revoked(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        tracing::info!(count = partitions.len(), "Partitions revoked");
        Ok(())
    }

    fn on_partitions_assigned(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        tracing::info!(count = partitions.len(), "Partitions assigned");
        Ok(())
    }
}

/// Listener built from a pair of closures.
pub struct FnRebalanceListener<R, A>
where
    R: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
    A: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
{
    on_revoked: R,
    on_assigned: A,
}

impl<R, A> FnRebalanceListener<R, A>
where
    R: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
    A: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
{
    /// Create a listener from revoke and assign closures.
    pub fn new(on_revoked: R, on_assigned: A) -> Self {
        Self {
            on_revoked,
            on_assigned,
        }
    }
}

impl<R, A> RebalanceListener for FnRebalanceListener<R, A>
where
    R: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
    A: Fn(&PartitionSet) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_partitions_revoked(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        (self.on_revoked)(partitions)
    }

    fn on_partitions_assigned(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        (self.on_assigned)(partitions)
    }
}

/// Listener that commits tracked positions to an [`OffsetStore`] when
/// partitions are revoked, so the next owner resumes from them.
pub struct OffsetCommitListener {
    group_id: String,
    store: Arc<dyn OffsetStore>,
    positions: RwLock<HashMap<TopicPartition, i64>>,
}

impl OffsetCommitListener {
    /// Create a listener committing to the given store.
    pub fn new(group_id: impl Into<String>, store: Arc<dyn OffsetStore>) -> Self {
        Self {
            group_id: group_id.into(),
            store,
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Record the current read position for a partition. Called by the
    /// fetch pipeline as records are delivered.
    pub fn record_position(&self, partition: TopicPartition, offset: i64) {
        self.positions.write().insert(partition, offset);
    }

    /// The tracked position for a partition, if any.
    pub fn position(&self, partition: &TopicPartition) -> Option<i64> {
        self.positions.read().get(partition).copied()
    }
}

impl RebalanceListener for OffsetCommitListener {
    fn on_partitions_revoked(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        let mut positions = self.positions.write();
        for partition in partitions {
            if let Some(offset) = positions.remove(partition) {
                self.store.commit(&self.group_id, partition, offset);
                tracing::debug!(%partition, offset, "Committed offset on revocation");
            }
        }
        Ok(())
    }

    fn on_partitions_assigned(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        let mut positions = self.positions.write();
        for partition in partitions {
            if let Some(offset) = self.store.committed(&self.group_id, partition) {
                positions.insert(partition.clone(), offset);
                tracing::debug!(%partition, offset, "Restored committed offset");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offsets::InMemoryOffsetStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn partitions(entries: &[(&str, u32)]) -> PartitionSet {
        entries
            .iter()
            .map(|(t, p)| TopicPartition::new(*t, *p))
            .collect()
    }

    #[test]
    fn test_fn_listener() {
        static REVOKES: AtomicUsize = AtomicUsize::new(0);
        static ASSIGNS: AtomicUsize = AtomicUsize::new(0);

        let listener = FnRebalanceListener::new(
            |_: &PartitionSet| {
                REVOKES.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            |_: &PartitionSet| {
                ASSIGNS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        listener.on_partitions_revoked(&partitions(&[("a", 0)])).unwrap();
        listener.on_partitions_assigned(&PartitionSet::new()).unwrap();

        assert_eq!(REVOKES.load(Ordering::SeqCst), 1);
        assert_eq!(ASSIGNS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_offset_commit_on_revoke() {
        let store = Arc::new(InMemoryOffsetStore::new());
        let listener = OffsetCommitListener::new("g1", store.clone());

        let a = TopicPartition::new("orders", 0);
        let b = TopicPartition::new("orders", 1);
        listener.record_position(a.clone(), 42);
        listener.record_position(b.clone(), 7);

        // Only partition A is revoked; only its position is committed.
        listener
            .on_partitions_revoked(&partitions(&[("orders", 0)]))
            .unwrap();

        assert_eq!(store.committed("g1", &a), Some(42));
        assert_eq!(store.committed("g1", &b), None);
        assert_eq!(listener.position(&a), None);
        assert_eq!(listener.position(&b), Some(7));
    }

    #[test]
    fn test_offset_restore_on_assign() {
        let store = Arc::new(InMemoryOffsetStore::new());
        let a = TopicPartition::new("orders", 0);
        store.commit("g1", &a, 99);

        let listener = OffsetCommitListener::new("g1", store);
        listener
            .on_partitions_assigned(&partitions(&[("orders", 0)]))
            .unwrap();

        assert_eq!(listener.position(&a), Some(99));
    }

    #[test]
    fn test_listeners_tolerate_empty_sets() {
        let empty = PartitionSet::new();
        NoopRebalanceListener.on_partitions_revoked(&empty).unwrap();
        LoggingRebalanceListener
            .on_partitions_assigned(&empty)
            .unwrap();
    }
}
