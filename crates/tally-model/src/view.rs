//! Aggregated checklist views and statistics
//!
//! A [`ChecklistView`] is what the execution screen renders: every test case
//! with all testers' results and a derived overall status. It is rebuilt from
//! scratch on every change and compared structurally against the previous
//! view to decide whether anything needs re-rendering.

use crate::id::{ResourceId, TesterId};
use crate::resource::{TestCase, TestResult};
use crate::status::{overall_status, TestStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A test case with every tester's result and the derived overall status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTestCase {
    /// The test case
    pub test_case: TestCase,
    /// Results of all assigned testers, ordered by tester id
    pub results: Vec<TestResult>,
    /// Overall status (see [`crate::status::aggregate`])
    pub overall_status: TestStatus,
}

impl AggregatedTestCase {
    /// Aggregate `results` for `test_case`
    #[must_use]
    pub fn new(test_case: TestCase, mut results: Vec<TestResult>) -> Self {
        results.sort_by(|a, b| a.tester_id.cmp(&b.tester_id));
        let overall_status = overall_status(results.iter().map(|r| r.status));
        Self {
            test_case,
            results,
            overall_status,
        }
    }

    /// Result recorded by `tester`
    #[must_use]
    pub fn result_for(&self, tester: &TesterId) -> Option<&TestResult> {
        self.results.iter().find(|r| &r.tester_id == tester)
    }
}

/// Progress of one tester across the checklist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesterProgress {
    /// Results not pending
    pub tested: usize,
    /// Results assigned
    pub total: usize,
}

/// Counts derived from a checklist view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistStats {
    /// Number of test cases
    pub total: usize,
    /// Test cases whose overall status is pending
    pub pending: usize,
    /// Test cases whose overall status is pass
    pub pass: usize,
    /// Test cases whose overall status is fail
    pub fail: usize,
    /// Test cases whose overall status is skipped
    pub skipped: usize,
    /// Per-tester progress
    pub testers: BTreeMap<TesterId, TesterProgress>,
}

impl ChecklistStats {
    /// Compute stats for aggregated test cases
    #[must_use]
    pub fn from_cases(cases: &[AggregatedTestCase]) -> Self {
        let mut stats = Self {
            total: cases.len(),
            ..Self::default()
        };
        for case in cases {
            match case.overall_status {
                TestStatus::Pending => stats.pending += 1,
                TestStatus::Pass => stats.pass += 1,
                TestStatus::Fail => stats.fail += 1,
                TestStatus::Skipped => stats.skipped += 1,
            }
            for result in &case.results {
                let progress = stats.testers.entry(result.tester_id.clone()).or_default();
                progress.total += 1;
                if result.status.is_tested() {
                    progress.tested += 1;
                }
            }
        }
        stats
    }

    /// Share of test cases with a non-pending overall status, in `[0, 1]`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.pending) as f64 / self.total as f64
    }
}

/// Rendered state of a checklist execution screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistView {
    /// Aggregated test cases in checklist order
    pub cases: Vec<AggregatedTestCase>,
    /// Derived statistics
    pub stats: ChecklistStats,
}

impl ChecklistView {
    /// Build the view for `test_cases` from a (merged) result collection
    ///
    /// Results whose test case is not listed are ignored. Test cases keep the
    /// order they are given in.
    #[must_use]
    pub fn build(test_cases: &[TestCase], results: &[TestResult]) -> Self {
        let mut by_case: HashMap<&ResourceId, Vec<TestResult>> = HashMap::new();
        for result in results {
            by_case
                .entry(&result.test_case_id)
                .or_default()
                .push(result.clone());
        }

        let cases: Vec<AggregatedTestCase> = test_cases
            .iter()
            .map(|tc| {
                let results = by_case.remove(&tc.id).unwrap_or_default();
                AggregatedTestCase::new(tc.clone(), results)
            })
            .collect();
        let stats = ChecklistStats::from_cases(&cases);

        Self { cases, stats }
    }

    /// Find a result anywhere in the view
    #[must_use]
    pub fn result(&self, result_id: &ResourceId) -> Option<&TestResult> {
        self.cases
            .iter()
            .flat_map(|c| c.results.iter())
            .find(|r| &r.id == result_id)
    }

    /// Aggregated entry for a test case
    #[must_use]
    pub fn case(&self, test_case_id: &ResourceId) -> Option<&AggregatedTestCase> {
        self.cases.iter().find(|c| &c.test_case.id == test_case_id)
    }
}

/// Structural equality of two rendered views
///
/// Used to gate re-rendering: a poll tick that produces an equal view must
/// not disturb the screen.
#[inline]
#[must_use]
pub fn views_equal(previous: &ChecklistView, next: &ChecklistView) -> bool {
    previous == next
}
