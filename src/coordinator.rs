//! Rebalance coordination state machine.
//!
//! The coordinator sequences the revoke/assign lifecycle for one
//! member. A round runs to completion synchronously inside a single
//! poll call:
//!
//! ```text
//! Stable ──actionable plan──▶ Revoking ──▶ BarrierWait ──▶ Assigning ──▶ Stable
//!                                              │
//!                                              └─ timeout / member left: fatal,
//!                                                 assignment dropped, must rejoin
//! ```
//!
//! The barrier between revocation and assignment is a distributed
//! protocol property synchronized through the group coordinator, not a
//! local lock: every member signals revocation-complete for the round's
//! generation and then blocks until the whole group has signaled.
//! Proceeding without confirmation would let this member receive a
//! partition whose previous owner has not finished flushing, so a
//! timeout fails the poll instead.

use crate::consumer::FetchGate;
use crate::error::{Error, Result};
use crate::listener::RebalanceListener;
use crate::membership::{GroupMembershipTracker, RebalancePlan};
use crate::types::{Generation, MemberId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Phase of the rebalance state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalancePhase {
    /// No rebalance in progress; fetching active.
    Stable,
    /// Fetching paused for outgoing partitions; revoke callback runs.
    Revoking,
    /// Waiting for group-wide revoke-phase completion.
    BarrierWait,
    /// Assign callback runs; fetching resumes afterwards.
    Assigning,
}

/// Channel to the group coordinator used to synchronize the
/// revoke phase across members.
///
/// The production implementation is the broker protocol channel; the
/// in-crate implementation is [`crate::testing::SimulatedGroup`].
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    /// Report that this member finished revoking for `generation`.
    async fn signal_revocation_complete(
        &self,
        member: MemberId,
        generation: Generation,
    ) -> std::result::Result<(), RebalanceError>;

    /// Block until every member of the group has signaled revocation
    /// completion for `generation`. The caller bounds this wait with
    /// the configured rebalance timeout.
    async fn await_group_ready(
        &self,
        member: MemberId,
        generation: Generation,
    ) -> std::result::Result<(), RebalanceError>;
}

/// Errors raised by the rebalance protocol. All of them leave the
/// member assignment-less; it must rejoin the group.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RebalanceError {
    /// The group did not confirm revoke-phase completion in time.
    #[error("timed out after {timeout:?} waiting for the group revocation barrier (generation {generation})")]
    BarrierTimeout {
        /// Generation of the failed round.
        generation: Generation,
        /// The configured rebalance timeout.
        timeout: Duration,
    },

    /// A member left the group while the barrier was open. Treated
    /// exactly like a timeout.
    #[error("member {member} left the group during the revocation barrier (generation {generation})")]
    MemberLeft {
        /// The departed member.
        member: MemberId,
        /// Generation of the failed round.
        generation: Generation,
    },

    /// A newer round started while this member was waiting on the
    /// barrier for an older one.
    #[error("revocation barrier for generation {generation} superseded by generation {superseded_by}")]
    Superseded {
        /// Generation this member was waiting for.
        generation: Generation,
        /// Generation that replaced it.
        superseded_by: Generation,
    },

    /// The link to the group coordinator is gone.
    #[error("group coordinator link closed")]
    LinkClosed,
}

/// Sequences revoke → barrier → assign for one member.
pub struct RebalanceCoordinator {
    member_id: MemberId,
    rebalance_timeout: Duration,
    link: Arc<dyn CoordinatorLink>,
    fetch_gate: Arc<FetchGate>,
    cancel: CancellationToken,
    phase: RebalancePhase,
}

impl RebalanceCoordinator {
    /// Create a coordinator for the given member.
    pub fn new(
        member_id: MemberId,
        rebalance_timeout: Duration,
        link: Arc<dyn CoordinatorLink>,
        fetch_gate: Arc<FetchGate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            member_id,
            rebalance_timeout,
            link,
            fetch_gate,
            cancel,
            phase: RebalancePhase::Stable,
        }
    }

    /// The current phase. Outside an executing poll this is always
    /// [`RebalancePhase::Stable`].
    pub fn phase(&self) -> RebalancePhase {
        self.phase
    }

    /// Run one rebalance round to completion.
    ///
    /// Listener failures are logged, the round still runs to the end
    /// (withholding the barrier signal would stall every peer), and
    /// the first failure is returned once the machine is back in
    /// `Stable`. Barrier failures are fatal: the tracker is reset and
    /// the fetch gate cleared before the error is returned.
    pub async fn execute(
        &mut self,
        plan: &RebalancePlan,
        tracker: &mut GroupMembershipTracker,
        listener: &dyn RebalanceListener,
    ) -> Result<()> {
        self.phase = RebalancePhase::Revoking;
        info!(
            member = self.member_id,
            generation = plan.generation,
            revoked = plan.revoked.len(),
            kept = plan.kept.len(),
            newly_assigned = plan.newly_assigned.len(),
            "Starting rebalance round"
        );

        // Halt fetching for outgoing partitions before the listener
        // runs, so no record from them is delivered afterwards.
        self.fetch_gate.halt(&plan.revoked);

        let revoke_err = listener.on_partitions_revoked(&plan.revoked).err();
        if let Some(e) = &revoke_err {
            warn!(
                member = self.member_id,
                generation = plan.generation,
                error = %e,
                "Revoke callback failed; continuing to the barrier"
            );
        }

        self.phase = RebalancePhase::BarrierWait;
        if let Err(e) = self
            .link
            .signal_revocation_complete(self.member_id, plan.generation)
            .await
        {
            return self.fail_round(tracker, e);
        }
        debug!(
            member = self.member_id,
            generation = plan.generation,
            "Signaled revocation complete, awaiting group"
        );

        let cancel = self.cancel.clone();
        let link = self.link.clone();
        let wait = link.await_group_ready(self.member_id, plan.generation);
        let confirmed = tokio::select! {
            _ = cancel.cancelled() => None,
            confirmed = tokio::time::timeout(self.rebalance_timeout, wait) => Some(confirmed),
        };

        match confirmed {
            None => {
                // Consumer closed mid-barrier: skip the assign callback.
                // The revoke callback has already run, so flushed state
                // is preserved.
                self.phase = RebalancePhase::Stable;
                tracker.reset();
                self.fetch_gate.clear();
                info!(
                    member = self.member_id,
                    generation = plan.generation,
                    "Barrier wait aborted by close"
                );
                return Err(Error::Cancelled);
            }
            Some(Err(_elapsed)) => {
                return self.fail_round(
                    tracker,
                    RebalanceError::BarrierTimeout {
                        generation: plan.generation,
                        timeout: self.rebalance_timeout,
                    },
                );
            }
            Some(Ok(Err(e))) => return self.fail_round(tracker, e),
            Some(Ok(Ok(()))) => {}
        }

        self.phase = RebalancePhase::Assigning;
        tracker.complete_rebalance(plan);

        let assign_err = listener.on_partitions_assigned(&plan.assignment).err();
        if let Some(e) = &assign_err {
            warn!(
                member = self.member_id,
                generation = plan.generation,
                error = %e,
                "Assign callback failed"
            );
        }

        // Fetching resumes for the new assignment only after the
        // assign callback has had its chance to seek.
        self.fetch_gate.install(&plan.assignment);
        self.phase = RebalancePhase::Stable;

        info!(
            member = self.member_id,
            generation = plan.generation,
            assigned = plan.assignment.len(),
            "Rebalance round complete"
        );

        if let Some(source) = revoke_err {
            return Err(Error::Listener {
                phase: RebalancePhase::Revoking,
                source,
            });
        }
        if let Some(source) = assign_err {
            return Err(Error::Listener {
                phase: RebalancePhase::Assigning,
                source,
            });
        }
        Ok(())
    }

    /// Abort the round after a barrier failure: the ordering guarantee
    /// can no longer be assumed, so the member drops its assignment
    /// and must rejoin.
    fn fail_round(
        &mut self,
        tracker: &mut GroupMembershipTracker,
        error: RebalanceError,
    ) -> Result<()> {
        warn!(
            member = self.member_id,
            error = %error,
            "Rebalance failed; dropping assignment"
        );
        self.phase = RebalancePhase::Stable;
        tracker.reset();
        self.fetch_gate.clear();
        Err(error.into())
    }
}

impl std::fmt::Debug for RebalanceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebalanceCoordinator")
            .field("member_id", &self.member_id)
            .field("phase", &self.phase)
            .finish()
    }
}
