//! Test statuses and the overall-status aggregation
//!
//! Every tester records one [`TestStatus`] per test case. The overall status
//! of a test case is reduced from all of them with a fixed precedence:
//! any `Fail` fails the case, otherwise any `Skipped` skips it, otherwise
//! the case stays `Pending` until every tester has passed it.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Outcome a tester recorded for a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Not executed yet
    #[default]
    Pending,

    /// Executed and passed
    Pass,

    /// Executed and failed
    Fail,

    /// Deliberately not executed
    Skipped,
}

impl TestStatus {
    /// All statuses in declaration order
    pub const ALL: [Self; 4] = [Self::Pending, Self::Pass, Self::Fail, Self::Skipped];

    /// Aggregation precedence (higher wins)
    ///
    /// `Pass` ranks lowest: a case only passes once all testers passed it.
    #[inline]
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Pending => 1,
            Self::Skipped => 2,
            Self::Fail => 3,
        }
    }

    /// Whether the tester has acted on the test case
    #[inline]
    #[must_use]
    pub const fn is_tested(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Lowercase name, as used on the wire
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skipped => "skipped",
        }
    }
}

impl Display for TestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "pass" | "passed" => Ok(Self::Pass),
            "fail" | "failed" => Ok(Self::Fail),
            "skipped" | "skip" => Ok(Self::Skipped),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Unrecognised status name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown test status: '{0}'")]
pub struct UnknownStatus(pub String);

/// Reduce per-tester statuses to one overall status
///
/// Returns `None` for an empty input: a test case nobody is assigned to has
/// no defined overall status. Use [`overall_status`] for the `Pending`
/// convention.
///
/// # Performance
/// O(n), stops early on the first `Fail`
#[must_use]
pub fn aggregate<I>(statuses: I) -> Option<TestStatus>
where
    I: IntoIterator<Item = TestStatus>,
{
    let mut best: Option<TestStatus> = None;
    for status in statuses {
        if status == TestStatus::Fail {
            return Some(status);
        }
        if best.map_or(true, |b| status.precedence() > b.precedence()) {
            best = Some(status);
        }
    }
    best
}

/// Overall status with zero testers treated as `Pending`
#[inline]
#[must_use]
pub fn overall_status<I>(statuses: I) -> TestStatus
where
    I: IntoIterator<Item = TestStatus>,
{
    aggregate(statuses).unwrap_or_default()
}
