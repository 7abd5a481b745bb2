//! Core types used throughout the consumer coordination layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Member identifier within a consumer group, issued by the group
/// coordinator when the member joins.
pub type MemberId = u64;

/// Rebalance generation: a monotonically increasing counter identifying
/// each rebalance round. Signals tagged with an older generation are
/// stale and must be discarded.
pub type Generation = u64;

/// A single partition of a topic's log.
///
/// Value-equal, hashable, and totally ordered by `(topic, partition)`
/// so that partition sets iterate deterministically. Never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    /// Topic name.
    pub topic: String,
    /// Partition index within the topic.
    pub partition: u32,
}

impl TopicPartition {
    /// Create a new topic-partition pair.
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// A set of partitions, ordered for deterministic iteration.
pub type PartitionSet = BTreeSet<TopicPartition>;

/// A proposed assignment for one member, produced group-wide by the
/// coordinator and staged locally until the next poll applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentProposal {
    /// Generation of the rebalance round this proposal belongs to.
    pub generation: Generation,
    /// The full set of partitions this member would own.
    pub partitions: PartitionSet,
}

impl AssignmentProposal {
    /// Create a proposal for the given generation.
    pub fn new(
        generation: Generation,
        partitions: impl IntoIterator<Item = TopicPartition>,
    ) -> Self {
        Self {
            generation,
            partitions: partitions.into_iter().collect(),
        }
    }

    /// A proposal that leaves the member with no partitions. Valid:
    /// listeners must tolerate empty collections.
    pub fn empty(generation: Generation) -> Self {
        Self {
            generation,
            partitions: PartitionSet::new(),
        }
    }
}
