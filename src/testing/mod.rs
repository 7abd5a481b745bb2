//! Testing utilities for group coordination.
//!
//! The centerpiece is [`SimulatedGroup`], an in-process group
//! coordinator that stands in for the broker side of the protocol:
//! it tracks members, computes range assignments over declared topics,
//! stages generation-tagged proposals into each member's inbox, and
//! implements the revocation barrier that [`CoordinatorLink`] members
//! synchronize on. Multi-member scenarios drive several
//! [`GroupConsumer`](crate::consumer::GroupConsumer)s against one
//! simulated group and assert on the observed callback ordering.
//!
//! # Example
//!
//! ```rust,ignore
//! use cohort::testing::{SimulatedGroup, EventLog, RecordingListener};
//!
//! let group = Arc::new(SimulatedGroup::new());
//! group.add_topic("orders", 6);
//!
//! let (mut consumer, sender) = GroupConsumer::new(1, config, group.clone(), listener);
//! group.add_member(1, sender);
//! consumer.poll().await?;
//! ```


use crate::consumer::ProposalSender;
use crate::coordinator::{CoordinatorLink, RebalanceError};
use crate::error::ListenerError;
use crate::listener::RebalanceListener;
use crate::types::{AssignmentProposal, Generation, MemberId, PartitionSet, TopicPartition};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Internal state of the simulated group coordinator.
#[derive(Debug, Default)]
struct GroupState {
    /// Current rebalance generation.
    generation: Generation,

    /// Declared topics and their partition counts.
    topics: BTreeMap<String, u32>,

    /// Registered members and their proposal inboxes.
    members: BTreeMap<MemberId, ProposalSender>,

    /// Members expected to signal for the current barrier.
    expected: BTreeSet<MemberId>,

    /// Members that have signaled revocation completion.
    signaled: BTreeSet<MemberId>,

    /// Failure verdict for the current barrier, if it broke.
    broken: Option<RebalanceError>,

    /// Whether the current barrier has completed.
    complete: bool,
}

impl GroupState {
    fn barrier_satisfied(&self) -> bool {
        self.expected.iter().all(|m| self.signaled.contains(m))
    }
}

/// In-process group coordinator used as a multi-member simulation
/// harness.
///
/// Membership changes trigger a new rebalance round: the generation is
/// bumped, a deterministic range assignment over the declared topics
/// is computed, and a proposal is staged for every member. A round
/// that starts while an earlier barrier is still open supersedes it;
/// a member departing while the barrier is open breaks it with a
/// member-left failure, and the next round must be started explicitly
/// with [`rebalance`](Self::rebalance) once the survivors are ready to
/// rejoin.
pub struct SimulatedGroup {
    state: Mutex<GroupState>,
    epoch: watch::Sender<u64>,
}

impl SimulatedGroup {
    /// Create an empty group with no topics or members.
    pub fn new() -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            state: Mutex::new(GroupState {
                complete: true,
                ..GroupState::default()
            }),
            epoch,
        }
    }

    /// Declare a topic. Triggers a rebalance round.
    pub fn add_topic(&self, name: impl Into<String>, partitions: u32) {
        let mut state = self.state.lock();
        state.topics.insert(name.into(), partitions);
        self.start_round(&mut state);
    }

    /// Register a member with its proposal inbox. Triggers a rebalance
    /// round.
    pub fn add_member(&self, member: MemberId, sender: ProposalSender) {
        let mut state = self.state.lock();
        state.members.insert(member, sender);
        info!(member, "Member joined simulated group");
        self.start_round(&mut state);
    }

    /// Deregister a member. If the current barrier is still open the
    /// round is failed with a member-left verdict; otherwise a new
    /// round is started for the survivors.
    pub fn remove_member(&self, member: MemberId) {
        let mut state = self.state.lock();
        if state.members.remove(&member).is_none() {
            return;
        }
        info!(member, "Member left simulated group");

        if !state.complete && state.expected.contains(&member) {
            let generation = state.generation;
            warn!(
                member,
                generation, "Member left while the revocation barrier was open"
            );
            state.broken = Some(RebalanceError::MemberLeft { member, generation });
            self.bump_epoch();
        } else {
            self.start_round(&mut state);
        }
    }

    /// Start a new rebalance round explicitly. Used to let members
    /// rejoin after a failed round.
    pub fn rebalance(&self) {
        let mut state = self.state.lock();
        self.start_round(&mut state);
    }

    /// The current generation.
    pub fn generation(&self) -> Generation {
        self.state.lock().generation
    }

    /// Number of registered members.
    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    /// Bump the generation, recompute assignments, stage proposals,
    /// and reset the barrier.
    fn start_round(&self, state: &mut GroupState) {
        state.generation += 1;
        let generation = state.generation;

        let assignments = range_assignments(
            &state.members.keys().copied().collect::<Vec<_>>(),
            &state.topics,
        );

        for (&member, sender) in &state.members {
            let partitions = assignments.get(&member).cloned().unwrap_or_default();
            let proposal = AssignmentProposal {
                generation,
                partitions,
            };
            if !sender.stage(proposal) {
                warn!(member, "Member inbox gone; proposal dropped");
            }
        }

        state.expected = state.members.keys().copied().collect();
        state.signaled.clear();
        state.broken = None;
        state.complete = state.expected.is_empty();

        debug!(
            generation,
            members = state.expected.len(),
            "Started rebalance round"
        );
        self.bump_epoch();
    }

    fn bump_epoch(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }
}

impl Default for SimulatedGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedGroup")
            .field("generation", &state.generation)
            .field("members", &state.members.len())
            .field("barrier_complete", &state.complete)
            .finish()
    }
}

#[async_trait]
impl CoordinatorLink for SimulatedGroup {
    async fn signal_revocation_complete(
        &self,
        member: MemberId,
        generation: Generation,
    ) -> Result<(), RebalanceError> {
        let mut state = self.state.lock();
        if state.generation > generation {
            return Err(RebalanceError::Superseded {
                generation,
                superseded_by: state.generation,
            });
        }
        if let Some(broken) = &state.broken {
            return Err(broken.clone());
        }

        state.signaled.insert(member);
        if state.barrier_satisfied() {
            state.complete = true;
            debug!(generation, "Revocation barrier complete");
            self.bump_epoch();
        }
        Ok(())
    }

    async fn await_group_ready(
        &self,
        _member: MemberId,
        generation: Generation,
    ) -> Result<(), RebalanceError> {
        let mut epoch = self.epoch.subscribe();
        loop {
            {
                let state = self.state.lock();
                if state.generation > generation {
                    return Err(RebalanceError::Superseded {
                        generation,
                        superseded_by: state.generation,
                    });
                }
                if let Some(broken) = &state.broken {
                    return Err(broken.clone());
                }
                if state.complete {
                    return Ok(());
                }
            }
            if epoch.changed().await.is_err() {
                return Err(RebalanceError::LinkClosed);
            }
        }
    }
}

/// Link whose barrier completes immediately. Sufficient for
/// single-member scenarios where no peer needs to be awaited.
#[derive(Debug, Default)]
pub struct LoopbackLink;

#[async_trait]
impl CoordinatorLink for LoopbackLink {
    async fn signal_revocation_complete(
        &self,
        _member: MemberId,
        _generation: Generation,
    ) -> Result<(), RebalanceError> {
        Ok(())
    }

    async fn await_group_ready(
        &self,
        _member: MemberId,
        _generation: Generation,
    ) -> Result<(), RebalanceError> {
        Ok(())
    }
}

/// Deterministic range assignment: for each topic, contiguous partition
/// ranges are dealt to members in ascending id order, with the leading
/// members absorbing the remainder.
pub fn range_assignments(
    members: &[MemberId],
    topics: &BTreeMap<String, u32>,
) -> BTreeMap<MemberId, PartitionSet> {
    let mut assignments: BTreeMap<MemberId, PartitionSet> =
        members.iter().map(|m| (*m, PartitionSet::new())).collect();

    if members.is_empty() {
        return assignments;
    }

    let mut sorted = members.to_vec();
    sorted.sort_unstable();

    for (topic, &count) in topics {
        let per_member = count / sorted.len() as u32;
        let extra = count % sorted.len() as u32;

        let mut partition = 0;
        for (i, member) in sorted.iter().enumerate() {
            let take = per_member + if (i as u32) < extra { 1 } else { 0 };
            let set = assignments.get_mut(member).expect("member present");
            for _ in 0..take {
                set.insert(TopicPartition::new(topic.clone(), partition));
                partition += 1;
            }
        }
    }

    assignments
}

/// Which listener callback an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// `on_partitions_revoked`.
    Revoked,
    /// `on_partitions_assigned`.
    Assigned,
}

/// One recorded listener invocation.
#[derive(Debug, Clone)]
pub struct ListenerEvent {
    /// Member whose listener fired.
    pub member: MemberId,
    /// Which callback fired.
    pub action: ListenerAction,
    /// The partitions passed to the callback.
    pub partitions: PartitionSet,
    /// Global sequence number, totally ordering events across members.
    pub seq: u64,
}

/// Shared, globally sequenced log of listener invocations across all
/// members of a test group.
#[derive(Debug, Default)]
pub struct EventLog {
    seq: AtomicU64,
    events: Mutex<Vec<ListenerEvent>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation.
    pub fn record(&self, member: MemberId, action: ListenerAction, partitions: &PartitionSet) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(ListenerEvent {
            member,
            action,
            partitions: partitions.clone(),
            seq,
        });
    }

    /// Snapshot of all recorded events in sequence order.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }
}

/// Listener that records every invocation into a shared [`EventLog`],
/// with optional failure injection.
pub struct RecordingListener {
    member: MemberId,
    log: Arc<EventLog>,
    fail_on_revoke: bool,
    fail_on_assign: bool,
}

impl RecordingListener {
    /// Create a recording listener for a member.
    pub fn new(member: MemberId, log: Arc<EventLog>) -> Self {
        Self {
            member,
            log,
            fail_on_revoke: false,
            fail_on_assign: false,
        }
    }

    /// Make `on_partitions_revoked` return an error after recording.
    pub fn fail_on_revoke(mut self) -> Self {
        self.fail_on_revoke = true;
        self
    }

    /// Make `on_partitions_assigned` return an error after recording.
    pub fn fail_on_assign(mut self) -> Self {
        self.fail_on_assign = true;
        self
    }
}

impl RebalanceListener for RecordingListener {
    fn on_partitions_revoked(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        self.log.record(self.member, ListenerAction::Revoked, partitions);
        if self.fail_on_revoke {
            return Err(format!("injected revoke failure for member {}", self.member).into());
        }
        Ok(())
    }

    fn on_partitions_assigned(&self, partitions: &PartitionSet) -> Result<(), ListenerError> {
        self.log.record(self.member, ListenerAction::Assigned, partitions);
        if self.fail_on_assign {
            return Err(format!("injected assign failure for member {}", self.member).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_assignment_even_split() {
        let mut topics = BTreeMap::new();
        topics.insert("t".to_string(), 6);

        let assignments = range_assignments(&[1, 2, 3], &topics);
        for set in assignments.values() {
            assert_eq!(set.len(), 2);
        }

        let total: usize = assignments.values().map(|s| s.len()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_range_assignment_remainder_goes_first() {
        let mut topics = BTreeMap::new();
        topics.insert("t".to_string(), 5);

        let assignments = range_assignments(&[1, 2, 3], &topics);
        assert_eq!(assignments[&1].len(), 2);
        assert_eq!(assignments[&2].len(), 2);
        assert_eq!(assignments[&3].len(), 1);
    }

    #[test]
    fn test_range_assignment_no_members() {
        let mut topics = BTreeMap::new();
        topics.insert("t".to_string(), 4);
        assert!(range_assignments(&[], &topics).is_empty());
    }

    #[test]
    fn test_range_assignment_is_deterministic() {
        let mut topics = BTreeMap::new();
        topics.insert("a".to_string(), 3);
        topics.insert("b".to_string(), 4);

        let first = range_assignments(&[2, 1], &topics);
        let second = range_assignments(&[1, 2], &topics);
        assert_eq!(first, second);
    }

    #[test]
    fn test_event_log_sequences_globally() {
        let log = EventLog::new();
        let empty = PartitionSet::new();
        log.record(1, ListenerAction::Revoked, &empty);
        log.record(2, ListenerAction::Assigned, &empty);

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].seq < events[1].seq);
    }
}
