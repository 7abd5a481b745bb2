//! Local group membership and assignment tracking.
//!
//! The tracker owns this member's view of its current assignment and
//! rebalance generation. Assignment is an owned value replaced
//! wholesale when a rebalance completes, never patched in place, so
//! readers always observe a consistent snapshot. All mutation happens
//! on the polling task.

use crate::types::{AssignmentProposal, Generation, PartitionSet};
use tracing::debug;

/// Decision for an incoming membership-change proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalDecision {
    /// The proposal references an outdated generation and is discarded.
    Stale,
    /// The proposal is actionable; the plan describes the transition.
    Actionable(RebalancePlan),
}

/// The computed transition from the current assignment to a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalancePlan {
    /// Generation of the round this plan belongs to.
    pub generation: Generation,

    /// Partitions being taken away: `current − proposal`.
    pub revoked: PartitionSet,

    /// Partitions surviving the round: `current ∩ proposal`.
    pub kept: PartitionSet,

    /// Partitions gained this round: `proposal − current`.
    pub newly_assigned: PartitionSet,

    /// The full assignment once the round completes.
    pub assignment: PartitionSet,
}

/// Tracks this member's current assignment and rebalance generation,
/// and decides whether membership-change signals are actionable.
#[derive(Debug, Default)]
pub struct GroupMembershipTracker {
    /// Current assignment. Owned here exclusively; replaced, not
    /// mutated, on each completed rebalance.
    assignment: PartitionSet,

    /// Generation of the last accepted rebalance round.
    generation: Generation,
}

impl GroupMembershipTracker {
    /// Create a tracker with no assignment at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current assignment snapshot.
    pub fn assignment(&self) -> &PartitionSet {
        &self.assignment
    }

    /// The current rebalance generation.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a partition is currently owned by this member.
    pub fn is_assigned(&self, partition: &crate::types::TopicPartition) -> bool {
        self.assignment.contains(partition)
    }

    /// Evaluate an incoming assignment proposal.
    ///
    /// A proposal is stale unless its generation is newer than the
    /// current one. On an actionable proposal the generation advances
    /// immediately (so later stale signals for older rounds keep being
    /// rejected) and the set differences are computed; the assignment
    /// itself is only replaced by [`complete_rebalance`].
    ///
    /// [`complete_rebalance`]: Self::complete_rebalance
    pub fn apply_membership_change(&mut self, proposal: AssignmentProposal) -> ProposalDecision {
        if proposal.generation <= self.generation {
            debug!(
                proposal_generation = proposal.generation,
                current_generation = self.generation,
                "Discarding stale membership change"
            );
            return ProposalDecision::Stale;
        }

        let revoked: PartitionSet = self
            .assignment
            .difference(&proposal.partitions)
            .cloned()
            .collect();
        let kept: PartitionSet = self
            .assignment
            .intersection(&proposal.partitions)
            .cloned()
            .collect();
        let newly_assigned: PartitionSet = proposal
            .partitions
            .difference(&self.assignment)
            .cloned()
            .collect();

        self.generation = proposal.generation;

        debug!(
            generation = proposal.generation,
            revoked = revoked.len(),
            kept = kept.len(),
            newly_assigned = newly_assigned.len(),
            "Membership change is actionable"
        );

        ProposalDecision::Actionable(RebalancePlan {
            generation: proposal.generation,
            revoked,
            kept,
            newly_assigned,
            assignment: proposal.partitions,
        })
    }

    /// Install the plan's assignment, replacing the previous one.
    /// Called by the coordinator when the round reaches the assign
    /// phase.
    pub fn complete_rebalance(&mut self, plan: &RebalancePlan) {
        self.assignment = plan.assignment.clone();
    }

    /// Drop the assignment entirely, leaving the member assignment-less
    /// until it rejoins. The generation is kept so signals from the
    /// failed round remain stale.
    pub fn reset(&mut self) {
        self.assignment = PartitionSet::new();
    }
}
