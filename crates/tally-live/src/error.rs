//! Error types for live sync

use tally_model::{ResourceId, StoreError, TesterId};

/// Live sync errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveError {
    /// The result belongs to another tester
    #[error("result {result} is owned by {owner}, not {tester}")]
    NotOwner {
        /// Result that was edited
        result: ResourceId,
        /// Its owner
        owner: TesterId,
        /// Tester who tried to edit it
        tester: TesterId,
    },

    /// No such result in the last polled state
    #[error("unknown result: {0}")]
    UnknownResult(ResourceId),

    /// Only failed edits can be retried
    #[error("no failed edit to retry for {0}")]
    NothingToRetry(ResourceId),

    /// Another poll is still running
    #[error("poll already in flight")]
    PollInFlight,

    /// Store call failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl LiveError {
    /// Whether trying again later can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PollInFlight => true,
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}
