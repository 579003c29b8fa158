//! Tally Draft
//!
//! Local draft editing of server collections and ordered batch persistence.
//!
//! # Core Concepts
//!
//! - [`Draft`]: Baseline snapshot, working copy and tombstones of one collection
//! - [`diff`]: Minimal [`ChangeSet`] turning the baseline into the draft
//! - [`BatchOrchestrator`]: Seven-phase save of a parent/child draft pair
//! - [`EditSession`]: Parent/child editing with cascade delete
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_draft::EditSession;
//! use tally_model::{Module, TestCase};
//!
//! let mut session = EditSession::<Module, TestCase>::load(modules, cases).await?;
//! let login = session.create_parent(Module::new("Login"))?;
//! session.create_child(&login, TestCase::new(login.clone(), "Valid password"))?;
//! let report = session.save().await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod changeset;
mod draft;
mod error;
mod orchestrator;
mod session;

// Re-exports
pub use changeset::{diff, ChangeSet, Reorder, Update};
pub use draft::Draft;
pub use error::{DraftError, SyncError};
pub use orchestrator::{save_flat, BatchFailure, BatchOrchestrator, BatchReport, OpCounts, Operation};
pub use session::EditSession;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
