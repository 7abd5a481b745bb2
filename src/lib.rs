//! Client-side consumer-group coordination for partitioned commit logs.
//!
//! This crate implements the consumer-side coordination layer of a
//! Kafka-style publish/subscribe platform:
//! - **Membership tracking** with generation-tagged staleness filtering
//! - **Rebalance sequencing** through a revoke → barrier → assign state
//!   machine driven synchronously from the poll call
//! - **Listener callbacks** with the group-wide guarantee that every
//!   member's revocation completes before any member's assignment begins
//! - **Pluggable serialization** and pass-through header metadata
//!
//! # Example
//!
//! ```rust,no_run
//! use cohort::{ConsumerConfig, GroupConsumer, LoggingRebalanceListener};
//! use cohort::testing::SimulatedGroup;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let group = Arc::new(SimulatedGroup::new());
//! group.add_topic("orders", 6);
//!
//! let config = ConsumerConfig::new("billing");
//! let (mut consumer, sender) = GroupConsumer::new(
//!     1,
//!     config,
//!     group.clone(),
//!     Arc::new(LoggingRebalanceListener),
//! );
//! group.add_member(1, sender);
//!
//! // Membership changes are staged in the background and applied
//! // inside poll, which runs the revoke/assign lifecycle.
//! consumer.poll().await?;
//! println!("assigned: {:?}", consumer.assignment());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     GroupConsumer::poll                   │
//! └──────────────────────────────────────────────────────────┘
//!        │ staged proposals (from liveness channel)
//!        ▼
//! ┌──────────────────┐   actionable plan   ┌──────────────────────┐
//! │ GroupMembership  │────────────────────▶│ RebalanceCoordinator │
//! │ Tracker          │                     │ revoke ▸ barrier ▸   │
//! │ (assignment,     │◀────────────────────│ assign               │
//! │  generation)     │   install / reset   └──────────┬───────────┘
//! └──────────────────┘                                │
//!                              ┌──────────────────────┼─────────────┐
//!                              ▼                      ▼             ▼
//!                     ┌───────────────┐      ┌───────────────┐ ┌─────────┐
//!                     │ Rebalance     │      │ CoordinatorLink│ │FetchGate│
//!                     │ Listener      │      │ (group barrier)│ │         │
//!                     └───────────────┘      └───────────────┘ └─────────┘
//! ```
//!
//! # Ordering model
//!
//! The revocation barrier is a distributed protocol property: each
//! member signals revoke-phase completion for the round's generation
//! and blocks until the whole group has signaled, bounded by the
//! configured rebalance timeout. A timeout (or a member departing
//! mid-barrier) fails the poll and leaves the member assignment-less
//! rather than risking a partition being owned twice.

pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod headers;
pub mod listener;
pub mod membership;
pub mod message;
pub mod offsets;
pub mod serialization;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use config::{ConsumerConfig, CoordinationConfig};
pub use consumer::{CloseHandle, FetchGate, GroupConsumer, PollOutcome, ProposalSender};
pub use coordinator::{CoordinatorLink, RebalanceCoordinator, RebalanceError, RebalancePhase};
pub use error::{Error, ListenerError, Result};
pub use headers::{Headers, SOURCE_ID, TENANT_ID};
pub use listener::{
    FnRebalanceListener, LoggingRebalanceListener, NoopRebalanceListener, OffsetCommitListener,
    RebalanceListener,
};
pub use membership::{GroupMembershipTracker, ProposalDecision, RebalancePlan};
pub use message::Record;
pub use offsets::{InMemoryOffsetStore, OffsetStore};
pub use serialization::{
    BincodeDeserializer, BincodeSerializer, EncodingError, MessageDeserializer, MessageSerializer,
    RawBytesSerializer,
};
pub use types::{AssignmentProposal, Generation, MemberId, PartitionSet, TopicPartition};
