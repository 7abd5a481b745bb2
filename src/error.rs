//! Error types for the consumer coordination layer.

use crate::coordinator::{RebalanceError, RebalancePhase};
use crate::serialization::EncodingError;
use thiserror::Error;

/// Result type alias for coordination operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by a user-supplied rebalance listener.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the consumer coordination layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Rebalance protocol errors (barrier timeout, member departure).
    #[error("rebalance error: {0}")]
    Rebalance(#[from] RebalanceError),

    /// A rebalance listener callback failed. The coordinator has
    /// already completed the transition; this is surfaced to the poll
    /// caller afterwards.
    #[error("listener failed during {phase:?} phase: {source}")]
    Listener {
        /// Phase the listener was invoked in.
        phase: RebalancePhase,
        /// The listener's own error.
        source: ListenerError,
    },

    /// Message encoding errors. Scoped to a single message; never
    /// affects coordinator state.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// The operation was cancelled by closing the consumer.
    #[error("operation cancelled")]
    Cancelled,

    /// The consumer has been closed.
    #[error("consumer closed")]
    Closed,
}

impl Error {
    /// True if this error left the consumer without an assignment,
    /// requiring it to rejoin the group.
    pub fn requires_rejoin(&self) -> bool {
        matches!(self, Error::Rebalance(_))
    }
}
