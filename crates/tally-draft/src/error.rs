//! Error types for draft editing and batch persistence
//!
//! Provides error handling for:
//! - Local mutations rejected before any network call
//! - Per-item remote failures aggregated over a batch
//! - Re-fetch failures after a batch

use crate::orchestrator::BatchReport;
use tally_model::{ResourceId, StoreError};

/// Local mutation errors (never reach the network)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// No draft entry with this id
    #[error("not found in draft: {0}")]
    NotFound(ResourceId),

    /// Mutation violates a local rule (e.g. duplicate name)
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Save / sync errors surfaced to the caller
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Local validation blocked the operation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Resource vanished between edit and save
    #[error("not found: {0}")]
    NotFound(ResourceId),

    /// Server-side conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Some operations of a batch failed; the rest were applied
    #[error("batch partially failed: {0}")]
    PartialBatchFailure(BatchReport),

    /// Could not re-fetch the collection after a batch; draft left untouched
    #[error("re-fetch after save failed: {source}")]
    Refetch {
        /// Underlying store error
        source: StoreError,
        /// What the batch achieved before the re-fetch
        report: BatchReport,
    },
}

impl SyncError {
    /// Whether the caller can retry the same operation
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Refetch { .. } | Self::PartialBatchFailure(_) => true,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_) => false,
        }
    }

    /// Batch report carried by the error, if any
    #[must_use]
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::PartialBatchFailure(report) | Self::Refetch { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Network(msg) => Self::Network(msg),
            StoreError::Rejected(msg) => Self::Validation(msg),
        }
    }
}

impl From<DraftError> for SyncError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::NotFound(id) => Self::NotFound(id),
            DraftError::Validation(msg) => Self::Validation(msg),
        }
    }
}
