//! Multi-tester live sync simulator
//!
//! Runs one [`LiveSession`] per tester against a shared in-memory result
//! store, lets every tester edit their own results at random, then waits for
//! all sessions to settle and checks two invariants:
//! - the server holds each tester's last edit of each result
//! - every session renders exactly what the server holds
//!
//! Mutations can be made to fail at random (`fail_rate`); failed saves are
//! retried until they go through, as a tester would.

use crate::flaky::FlakyStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tally_live::{FocusTarget, LiveError, LiveSession, ResultField, SyncConfig};
use tally_model::{
    ChecklistStats, MemoryStore, ResourceId, ResourceStore, ResultPatch, TestCase, TestResult,
    TestStatus, TesterId,
};

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Concurrent testers
    pub testers: usize,
    /// Test cases in the checklist
    pub cases: usize,
    /// Local edits per tester
    pub edits_per_tester: usize,
    /// Probability that a mutating store call fails
    pub fail_rate: f64,
    /// Give up waiting for sessions to settle after this many rounds
    pub max_settle_rounds: usize,
    /// Session timing
    pub sync: SyncConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            testers: 3,
            cases: 10,
            edits_per_tester: 20,
            fail_rate: 0.0,
            max_settle_rounds: 50,
            sync: fast_sync_config(),
        }
    }
}

/// Short intervals suitable for a simulation run
#[must_use]
pub fn fast_sync_config() -> SyncConfig {
    SyncConfig::new()
        .with_poll_interval(Duration::from_millis(50))
        .with_save_debounce(Duration::from_millis(10))
        .with_clear_debounce(Duration::from_millis(40))
}

/// An invariant broken at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The server does not hold the tester's last edit
    LostEdit {
        /// Result
        result_id: ResourceId,
        /// Last status the tester set
        expected: TestStatus,
        /// Status on the server
        actual: Option<TestStatus>,
    },
    /// A session renders something other than the server state
    StaleView {
        /// Session owner
        tester: TesterId,
        /// Result
        result_id: ResourceId,
        /// Status on the server
        expected: TestStatus,
        /// Status rendered
        actual: Option<TestStatus>,
    },
    /// A session still has unconfirmed edits
    Unsettled {
        /// Session owner
        tester: TesterId,
        /// Pending overlay entries
        pending: usize,
    },
    /// A tester task died
    TesterAborted {
        /// Tester
        tester: TesterId,
    },
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulatorStats {
    /// Local edits accepted
    pub edits_applied: u64,
    /// Store failures injected
    pub failures_injected: u64,
    /// Failed saves retried
    pub retries: u64,
    /// Rounds spent waiting for sessions to settle
    pub settle_rounds: usize,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Counters
    pub stats: SimulatorStats,
    /// Broken invariants
    pub violations: Vec<Violation>,
    /// Checklist statistics as rendered by the first tester
    pub checklist: ChecklistStats,
}

impl SimulatorReport {
    /// Whether every invariant held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Plain-text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Tally Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Testers: {}", self.config.testers);
        let _ = writeln!(report, "Test Cases: {}", self.config.cases);
        let _ = writeln!(report, "Fail Rate: {}", self.config.fail_rate);
        let _ = writeln!(report, "Edits Applied: {}", self.stats.edits_applied);
        let _ = writeln!(report, "Failures Injected: {}", self.stats.failures_injected);
        let _ = writeln!(report, "Retries: {}", self.stats.retries);
        let _ = writeln!(report, "Settle Rounds: {}", self.stats.settle_rounds);
        let _ = writeln!(
            report,
            "Checklist: {} pass, {} fail, {} skipped, {} pending",
            self.checklist.pass, self.checklist.fail, self.checklist.skipped, self.checklist.pending
        );
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {v:?}", i + 1);
            }
        }

        let _ = write!(
            report,
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Id of `tester`'s result for `test_case`
#[must_use]
pub fn result_key(test_case: &ResourceId, tester: &TesterId) -> ResourceId {
    ResourceId::new(format!("r-{test_case}-{tester}"))
}

/// Run the simulator
///
/// # Errors
/// Invalid sync configuration, or a session that cannot load the checklist
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, LiveError> {
    config.sync.validate()?;
    tracing::info!(
        seed = config.seed,
        testers = config.testers,
        cases = config.cases,
        "simulation starting"
    );

    let cases: Vec<TestCase> = (0..config.cases)
        .map(|i| {
            TestCase::new("m1", format!("Case {i}"))
                .with_id(ResourceId::new(format!("t{i}")))
                .with_order(u32::try_from(i).unwrap_or(u32::MAX))
        })
        .collect();
    let testers: Vec<TesterId> = (0..config.testers)
        .map(|i| TesterId::new(format!("tester-{i}")))
        .collect();
    let seeded: Vec<TestResult> = cases
        .iter()
        .flat_map(|case| {
            testers
                .iter()
                .map(|tester| {
                    TestResult::pending(result_key(&case.id, tester), case.id.clone(), tester.clone())
                })
        })
        .collect();

    let case_store: Arc<dyn ResourceStore<TestCase>> = Arc::new(MemoryStore::with_records(cases.clone()));
    let server = Arc::new(MemoryStore::with_records(seeded));
    let server_dyn: Arc<dyn ResourceStore<TestResult>> = server.clone();
    let flaky = Arc::new(FlakyStore::new(server_dyn, config.fail_rate, config.seed));

    let mut sessions = Vec::with_capacity(testers.len());
    for tester in &testers {
        let session = LiveSession::connect(
            tester.clone(),
            Arc::clone(&case_store),
            flaky.clone(),
            config.sync.clone(),
        )
        .await?;
        session.start_polling();
        sessions.push(Arc::new(session));
    }

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    // Edit phase
    let pause_ms = config.sync.save_debounce_ms * 2;
    let tasks: Vec<_> = sessions
        .iter()
        .zip(&testers)
        .enumerate()
        .map(|(idx, (session, tester))| {
            let own: Vec<ResourceId> = cases.iter().map(|c| result_key(&c.id, tester)).collect();
            let seed = config.seed.wrapping_add(idx as u64 + 1);
            tokio::spawn(run_tester(
                Arc::clone(session),
                own,
                config.edits_per_tester,
                seed,
                pause_ms,
            ))
        })
        .collect();

    let mut expectations: BTreeMap<ResourceId, TestStatus> = BTreeMap::new();
    for (outcome, tester) in futures::future::join_all(tasks).await.into_iter().zip(&testers) {
        match outcome {
            Ok((expected, applied)) => {
                stats.edits_applied += applied;
                expectations.extend(expected);
            }
            Err(err) => {
                tracing::error!(%tester, error = %err, "tester task failed");
                violations.push(Violation::TesterAborted {
                    tester: tester.clone(),
                });
            }
        }
    }

    // Settle phase
    while stats.settle_rounds < config.max_settle_rounds {
        let mut pending = 0;
        for session in &sessions {
            for failed in session.failed_edits() {
                if session.retry(&failed.result_id).is_ok() {
                    stats.retries += 1;
                }
            }
            pending += session.pending_edits();
        }
        if pending == 0 {
            break;
        }
        stats.settle_rounds += 1;
        tokio::time::sleep(config.sync.clear_debounce() + config.sync.poll_interval()).await;
    }

    for session in &sessions {
        session.stop_polling();
        loop {
            match session.poll_now().await {
                Ok(_) => break,
                Err(LiveError::PollInFlight) => tokio::time::sleep(Duration::from_millis(1)).await,
                Err(err) => return Err(err),
            }
        }
    }
    stats.failures_injected = flaky.injected();

    // Verification
    for (result_id, expected) in &expectations {
        let actual = server.get(result_id).map(|r| r.status);
        if actual != Some(*expected) {
            violations.push(Violation::LostEdit {
                result_id: result_id.clone(),
                expected: *expected,
                actual,
            });
        }
    }
    let server_state = server.records();
    for (session, tester) in sessions.iter().zip(&testers) {
        let pending = session.pending_edits();
        if pending > 0 {
            violations.push(Violation::Unsettled {
                tester: tester.clone(),
                pending,
            });
        }
        let view = session.view();
        for record in &server_state {
            let actual = view.result(&record.id).map(|r| r.status);
            if actual != Some(record.status) {
                violations.push(Violation::StaleView {
                    tester: tester.clone(),
                    result_id: record.id.clone(),
                    expected: record.status,
                    actual,
                });
            }
        }
    }

    let checklist = sessions
        .first()
        .map(|s| s.view().stats)
        .unwrap_or_default();
    tracing::info!(violations = violations.len(), "simulation finished");

    Ok(SimulatorReport {
        config,
        stats,
        violations,
        checklist,
    })
}

async fn run_tester(
    session: Arc<LiveSession>,
    own: Vec<ResourceId>,
    edits: usize,
    seed: u64,
    pause_ms: u64,
) -> (BTreeMap<ResourceId, TestStatus>, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut expected = BTreeMap::new();
    let mut applied = 0;
    if own.is_empty() {
        return (expected, applied);
    }

    for n in 0..edits {
        let id = &own[rng.gen_range(0..own.len())];
        let status = TestStatus::ALL[rng.gen_range(0..TestStatus::ALL.len())];
        let mut patch = ResultPatch::default().status(status);
        if rng.gen_bool(0.3) {
            patch = patch.notes(format!("edit {n}"));
        }

        match session.apply_local_edit(id, patch) {
            Ok(()) => {
                expected.insert(id.clone(), status);
                applied += 1;
            }
            Err(err) => tracing::warn!(%id, error = %err, "edit rejected"),
        }

        let focus = rng
            .gen_bool(0.2)
            .then(|| FocusTarget::new(id.clone(), ResultField::Notes));
        session.set_focus(focus);
        tokio::time::sleep(Duration::from_millis(rng.gen_range(0..=pause_ms))).await;
    }

    session.set_focus(None);
    (expected, applied)
}
