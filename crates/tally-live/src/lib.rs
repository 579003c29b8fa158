//! Tally Live
//!
//! Multi-tester live sync of a checklist execution screen.
//!
//! # Core Concepts
//!
//! - [`PendingEditOverlay`]: Local edits that win over polled data until settled
//! - [`TimerTable`]: One save or clear debounce timer per result
//! - [`LivePollMerger`]: Clock-explicit edit lifecycle and poll merging
//! - [`LiveSession`]: Tokio driver publishing the merged [`ChecklistView`](tally_model::ChecklistView)
//! - [`SyncConfig`]: Poll interval, debounces and collapse statuses
//!
//! # Edit Lifecycle
//!
//! ```text
//! clean → Editing → Saving → Settling → clean
//!                      ↘ Failed (kept until retried)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_live::{LiveSession, SyncConfig};
//! use tally_model::{ResultPatch, TestStatus};
//!
//! let session = LiveSession::connect(tester, cases, results, SyncConfig::default()).await?;
//! session.start_polling();
//! session.apply_local_edit(&result_id, ResultPatch::default().status(TestStatus::Pass))?;
//! let mut views = session.subscribe();
//! views.changed().await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod config;
mod error;
mod merger;
mod overlay;
mod session;
mod timers;

// Re-exports
pub use config::SyncConfig;
pub use error::LiveError;
pub use merger::{
    FailedEdit, FocusTarget, LivePollMerger, PollOutcome, ResultField, SaveRequest, TickOutcome,
};
pub use overlay::{EditPhase, PendingEdit, PendingEditOverlay};
pub use session::LiveSession;
pub use timers::{Timer, TimerKind, TimerTable};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
