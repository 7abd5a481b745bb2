//! Poll-side consumer driver.
//!
//! `GroupConsumer` wires the membership tracker, the rebalance
//! coordinator, the listener, and the fetch gate together. Membership
//! changes arrive asynchronously from the background liveness channel
//! but are only staged; they are applied synchronously inside the next
//! [`poll`](GroupConsumer::poll) call, before any new records would be
//! returned to the caller.

use crate::config::ConsumerConfig;
use crate::coordinator::{CoordinatorLink, RebalanceCoordinator, RebalancePhase};
use crate::error::{Error, Result};
use crate::listener::RebalanceListener;
use crate::membership::{GroupMembershipTracker, ProposalDecision};
use crate::types::{AssignmentProposal, Generation, MemberId, PartitionSet, TopicPartition};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Gate deciding which partitions the fetch pipeline may read from.
///
/// During a rebalance the gate drops outgoing partitions before the
/// revoke callback runs and admits the new assignment only after the
/// assign callback returns.
#[derive(Debug, Default)]
pub struct FetchGate {
    fetchable: RwLock<PartitionSet>,
}

impl FetchGate {
    /// Create a gate with nothing fetchable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the fetch pipeline may read from a partition.
    pub fn is_fetchable(&self, partition: &TopicPartition) -> bool {
        self.fetchable.read().contains(partition)
    }

    /// Snapshot of all currently fetchable partitions.
    pub fn fetchable(&self) -> PartitionSet {
        self.fetchable.read().clone()
    }

    /// Stop fetching from the given partitions.
    pub(crate) fn halt(&self, partitions: &PartitionSet) {
        let mut fetchable = self.fetchable.write();
        for partition in partitions {
            fetchable.remove(partition);
        }
    }

    /// Replace the fetchable set with a new assignment.
    pub(crate) fn install(&self, assignment: &PartitionSet) {
        *self.fetchable.write() = assignment.clone();
    }

    /// Stop fetching entirely.
    pub(crate) fn clear(&self) {
        self.fetchable.write().clear();
    }
}

/// Handle used by the background liveness channel to stage
/// membership-change proposals for the next poll.
#[derive(Debug, Clone)]
pub struct ProposalSender {
    tx: mpsc::UnboundedSender<AssignmentProposal>,
}

impl ProposalSender {
    /// Stage a proposal. Returns false if the consumer is gone.
    pub fn stage(&self, proposal: AssignmentProposal) -> bool {
        self.tx.send(proposal).is_ok()
    }
}

/// Outcome of a poll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No membership change was pending; no listener was invoked.
    Idle,
    /// A rebalance round completed at the given generation.
    Rebalanced {
        /// Generation of the completed round.
        generation: Generation,
    },
}

/// A consumer-group member: applies staged membership changes and
/// drives the rebalance lifecycle from its poll call.
pub struct GroupConsumer {
    config: ConsumerConfig,
    member_id: MemberId,
    tracker: GroupMembershipTracker,
    coordinator: RebalanceCoordinator,
    listener: Arc<dyn RebalanceListener>,
    fetch_gate: Arc<FetchGate>,
    inbox: mpsc::UnboundedReceiver<AssignmentProposal>,
    cancel: CancellationToken,
}

impl GroupConsumer {
    /// Create a consumer for the given member, returning it together
    /// with the sender half of its staged-proposal inbox.
    pub fn new(
        member_id: MemberId,
        config: ConsumerConfig,
        link: Arc<dyn CoordinatorLink>,
        listener: Arc<dyn RebalanceListener>,
    ) -> (Self, ProposalSender) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let fetch_gate = Arc::new(FetchGate::new());
        let cancel = CancellationToken::new();

        let coordinator = RebalanceCoordinator::new(
            member_id,
            config.coordination.rebalance_timeout,
            link,
            fetch_gate.clone(),
            cancel.clone(),
        );

        info!(
            member = member_id,
            group = %config.group_id,
            client = %config.client_id,
            "Created group consumer"
        );

        let consumer = Self {
            config,
            member_id,
            tracker: GroupMembershipTracker::new(),
            coordinator,
            listener,
            fetch_gate,
            inbox,
            cancel,
        };

        (consumer, ProposalSender { tx })
    }

    /// This member's identifier.
    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// The consumer configuration.
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Snapshot of the current assignment.
    pub fn assignment(&self) -> PartitionSet {
        self.tracker.assignment().clone()
    }

    /// The current rebalance generation.
    pub fn generation(&self) -> Generation {
        self.tracker.generation()
    }

    /// The fetch gate, shared with the fetch pipeline.
    pub fn fetch_gate(&self) -> Arc<FetchGate> {
        self.fetch_gate.clone()
    }

    /// The current coordinator phase.
    pub fn phase(&self) -> RebalancePhase {
        self.coordinator.phase()
    }

    /// Replace the rebalance listener. At most one listener is active;
    /// re-subscribing replaces the previous one.
    pub fn subscribe(&mut self, listener: Arc<dyn RebalanceListener>) {
        self.listener = listener;
    }

    /// A handle that can close this consumer from another task,
    /// aborting an in-flight barrier wait.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Close the consumer. An in-flight barrier wait aborts, skipping
    /// the pending assign callback; the listener is not invoked for
    /// shutdown itself.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// True once the consumer has been closed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply any staged membership change and run the rebalance
    /// lifecycle to completion.
    ///
    /// When several proposals are staged, only the newest generation is
    /// applied; the ones it superseded are discarded. When nothing is
    /// staged (or only stale signals), no listener method is invoked.
    pub async fn poll(&mut self) -> Result<PollOutcome> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }

        let mut newest: Option<AssignmentProposal> = None;
        while let Ok(proposal) = self.inbox.try_recv() {
            match &newest {
                Some(n) if proposal.generation <= n.generation => {
                    debug!(
                        member = self.member_id,
                        generation = proposal.generation,
                        "Discarding superseded staged proposal"
                    );
                }
                _ => {
                    if let Some(old) = newest.replace(proposal) {
                        debug!(
                            member = self.member_id,
                            generation = old.generation,
                            "Discarding superseded staged proposal"
                        );
                    }
                }
            }
        }

        let Some(proposal) = newest else {
            return Ok(PollOutcome::Idle);
        };

        match self.tracker.apply_membership_change(proposal) {
            ProposalDecision::Stale => Ok(PollOutcome::Idle),
            ProposalDecision::Actionable(plan) => {
                let generation = plan.generation;
                let listener = self.listener.clone();
                self.coordinator
                    .execute(&plan, &mut self.tracker, listener.as_ref())
                    .await?;
                Ok(PollOutcome::Rebalanced { generation })
            }
        }
    }
}

impl std::fmt::Debug for GroupConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupConsumer")
            .field("member_id", &self.member_id)
            .field("group_id", &self.config.group_id)
            .field("generation", &self.tracker.generation())
            .field("assigned", &self.tracker.assignment().len())
            .finish()
    }
}

/// Cloneable handle that closes a [`GroupConsumer`] from another task.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    cancel: CancellationToken,
}

impl CloseHandle {
    /// Close the consumer.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EventLog, ListenerAction, LoopbackLink, RecordingListener};
    use crate::types::TopicPartition;
    use std::time::Duration;

    fn partitions(entries: &[(&str, u32)]) -> PartitionSet {
        entries
            .iter()
            .map(|(t, p)| TopicPartition::new(*t, *p))
            .collect()
    }

    fn consumer_with_log() -> (GroupConsumer, ProposalSender, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let listener = Arc::new(RecordingListener::new(1, log.clone()));
        let config =
            ConsumerConfig::new("test-group").with_rebalance_timeout(Duration::from_secs(1));
        let (consumer, sender) =
            GroupConsumer::new(1, config, Arc::new(LoopbackLink), listener);
        (consumer, sender, log)
    }

    #[tokio::test]
    async fn test_poll_without_pending_change_is_noop() {
        let (mut consumer, _sender, log) = consumer_with_log();

        assert_eq!(consumer.poll().await.unwrap(), PollOutcome::Idle);
        assert_eq!(consumer.poll().await.unwrap(), PollOutcome::Idle);
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_poll_applies_staged_proposal() {
        let (mut consumer, sender, log) = consumer_with_log();

        sender.stage(AssignmentProposal::new(1, [TopicPartition::new("t", 0)]));
        let outcome = consumer.poll().await.unwrap();

        assert_eq!(outcome, PollOutcome::Rebalanced { generation: 1 });
        assert_eq!(consumer.assignment(), partitions(&[("t", 0)]));
        assert!(consumer.fetch_gate().is_fetchable(&TopicPartition::new("t", 0)));

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, ListenerAction::Revoked);
        assert_eq!(events[1].action, ListenerAction::Assigned);
    }

    #[tokio::test]
    async fn test_stale_proposal_triggers_no_listener() {
        let (mut consumer, sender, log) = consumer_with_log();

        sender.stage(AssignmentProposal::new(2, [TopicPartition::new("t", 0)]));
        consumer.poll().await.unwrap();
        let events_after_join = log.events().len();

        // Generation 1 predates the current assignment.
        sender.stage(AssignmentProposal::new(1, [TopicPartition::new("t", 9)]));
        assert_eq!(consumer.poll().await.unwrap(), PollOutcome::Idle);

        assert_eq!(log.events().len(), events_after_join);
        assert_eq!(consumer.assignment(), partitions(&[("t", 0)]));
    }

    #[tokio::test]
    async fn test_staged_proposals_coalesce_to_newest() {
        let (mut consumer, sender, log) = consumer_with_log();

        sender.stage(AssignmentProposal::new(1, [TopicPartition::new("t", 0)]));
        sender.stage(AssignmentProposal::new(2, [TopicPartition::new("t", 1)]));
        sender.stage(AssignmentProposal::new(3, [TopicPartition::new("t", 2)]));

        let outcome = consumer.poll().await.unwrap();
        assert_eq!(outcome, PollOutcome::Rebalanced { generation: 3 });
        assert_eq!(consumer.assignment(), partitions(&[("t", 2)]));

        // One round only: one revoke, one assign.
        assert_eq!(log.events().len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_replaces_listener() {
        let (mut consumer, sender, first_log) = consumer_with_log();

        let second_log = Arc::new(EventLog::new());
        consumer.subscribe(Arc::new(RecordingListener::new(1, second_log.clone())));

        sender.stage(AssignmentProposal::new(1, [TopicPartition::new("t", 0)]));
        consumer.poll().await.unwrap();

        assert!(first_log.events().is_empty());
        assert_eq!(second_log.events().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_after_close_fails() {
        let (mut consumer, _sender, log) = consumer_with_log();

        consumer.close();
        let err = consumer.poll().await.unwrap_err();
        assert!(matches!(err, Error::Closed));

        // Listener is not invoked on shutdown.
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_gate_empty_until_first_assignment() {
        let (consumer, _sender, _log) = consumer_with_log();
        assert!(consumer.fetch_gate().fetchable().is_empty());
        assert_eq!(consumer.phase(), RebalancePhase::Stable);
    }
}
