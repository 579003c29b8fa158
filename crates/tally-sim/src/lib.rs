//! Tally Sim
//!
//! Tooling around the sync engines.
//!
//! # Core Concepts
//!
//! - [`run_simulator`]: Several testers editing one checklist concurrently,
//!   checked for lost edits and stale views once every session settles
//! - [`FlakyStore`]: Store decorator that fails a seeded share of mutations
//! - [`diff_modules`]: What a save would send for an edited module list

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod changes;
mod flaky;
mod simulator;

// Re-exports
pub use changes::{diff_modules, render_text};
pub use flaky::FlakyStore;
pub use simulator::{
    fast_sync_config, result_key, run_simulator, SimulatorConfig, SimulatorReport,
    SimulatorStats, Violation,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
