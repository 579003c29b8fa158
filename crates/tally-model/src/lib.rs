//! Tally Model
//!
//! Resources, statuses and the store contract shared by the draft and live
//! sync engines.
//!
//! # Core Concepts
//!
//! - [`ResourceId`]: Opaque id; local-only ids carry the [`LOCAL_PREFIX`]
//! - [`Resource`]: Server-owned entity with comparable fields and a patch type
//! - [`TestStatus`] and [`aggregate`]: Per-tester outcome and its reduction
//! - [`ChecklistView`]: Aggregated test cases plus derived statistics
//! - [`ResourceStore`]: Asynchronous, per-call fallible backend
//! - [`MemoryStore`]: In-memory store with a call log and fault injection
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_model::{aggregate, TestStatus};
//!
//! let overall = aggregate([TestStatus::Pass, TestStatus::Fail]);
//! assert_eq!(overall, Some(TestStatus::Fail));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod id;
mod memory;
mod resource;
mod status;
mod store;
mod view;

// Re-exports
pub use id::{IdError, ResourceId, TesterId, LOCAL_PREFIX};
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use resource::{
    ChecklistModule, ChecklistModulePatch, Module, ModulePatch, Priority, Resource,
    ResourceKind, ResultPatch, TestCase, TestCasePatch, TestResult,
};
pub use status::{aggregate, overall_status, TestStatus, UnknownStatus};
pub use store::{ResourceStore, StoreError};
pub use view::{views_equal, AggregatedTestCase, ChecklistStats, ChecklistView, TesterProgress};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
