//! Race test reports

use std::time::Duration;

use serde::Serialize;

use crate::common::Result;
use crate::driver::Sweep;
use crate::fixture::Nudge;
use crate::races::{Expectation, RaceTest};
use crate::verdict::{self, Verdict};

/// Test status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// The test behaved as expected
    Passed,
    /// A safe test failed, or an unsafe one was not caught
    Failed,
    /// Tracing was unavailable
    Skipped,
    /// The harness itself failed
    Error,
}

/// Result of one sweep
#[derive(Debug, Clone, Serialize)]
pub struct FixtureReport {
    pub nudge: Nudge,
    pub steps_tried: usize,
    /// One letter per step count, e.g. `IIIINNN`
    pub pattern: String,
    pub verdict: Verdict,
    /// Program counter at the first step that reached the kernel, if known
    pub boundary_pc: Option<usize>,
}

impl FixtureReport {
    pub fn from_sweep(sweep: &Sweep) -> Self {
        let results = sweep.results();
        let verdict = verdict::classify(sweep.nudge, &results, sweep.terminal.is_some());
        let boundary_pc = match verdict {
            Verdict::Pass { boundary: Some(step) } => sweep.outcomes.get(step).and_then(|o| o.pc),
            _ => None,
        };

        Self {
            nudge: sweep.nudge,
            steps_tried: sweep.outcomes.len(),
            pattern: verdict::pattern(&results),
            verdict,
            boundary_pc,
        }
    }
}

/// Result of one race test across every fixture
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    pub test: &'static str,
    pub expectation: Expectation,
    pub status: TestStatus,
    pub fixtures: Vec<FixtureReport>,
    /// Execution time in milliseconds
    pub exec_time_ms: u64,
    /// Error message (if any)
    pub error_message: Option<String>,
}

impl RaceReport {
    pub fn from_sweeps(test: &RaceTest, sweeps: &[Sweep], elapsed: Duration) -> Self {
        let fixtures: Vec<FixtureReport> = sweeps.iter().map(FixtureReport::from_sweep).collect();
        let all_passed = fixtures.iter().all(|f| f.verdict.passed());
        let status = match (test.expectation, all_passed) {
            (Expectation::Safe, true) | (Expectation::Unsafe, false) => TestStatus::Passed,
            _ => TestStatus::Failed,
        };

        Self {
            test: test.name,
            expectation: test.expectation,
            status,
            fixtures,
            exec_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error_message: None,
        }
    }

    pub fn skipped(test: &RaceTest, reason: String) -> Self {
        Self::without_sweeps(test, TestStatus::Skipped, reason)
    }

    pub fn error(test: &RaceTest, message: String) -> Self {
        Self::without_sweeps(test, TestStatus::Error, message)
    }

    fn without_sweeps(test: &RaceTest, status: TestStatus, message: String) -> Self {
        Self {
            test: test.name,
            expectation: test.expectation,
            status,
            fixtures: Vec::new(),
            exec_time_ms: 0,
            error_message: Some(message),
        }
    }

    /// Whether some fixture exposed a race
    pub fn race_detected(&self) -> bool {
        self.fixtures.iter().any(|f| !f.verdict.passed())
    }

    /// Writes a human summary through `log`
    pub fn log_summary(&self) {
        match self.status {
            TestStatus::Passed => log::info!("{}: passed ({:?})", self.test, self.expectation),
            TestStatus::Failed => log::error!("{}: FAILED ({:?})", self.test, self.expectation),
            TestStatus::Skipped | TestStatus::Error => log::warn!(
                "{}: {:?}: {}",
                self.test,
                self.status,
                self.error_message.as_deref().unwrap_or("")
            ),
        }
        for fixture in &self.fixtures {
            log::info!(
                "  {:<13} {:?} {}",
                fixture.nudge.name(),
                fixture.verdict,
                fixture.pattern
            );
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StepOutcome;
    use crate::races::{self, RunResult};

    fn outcome(steps: usize, result: RunResult, pc: usize) -> StepOutcome {
        StepOutcome {
            steps,
            taken: steps,
            result,
            blocked: false,
            exited_early: false,
            pc: Some(pc),
        }
    }

    fn sweep(nudge: Nudge, results: &[RunResult]) -> Sweep {
        let outcomes: Vec<StepOutcome> = results
            .iter()
            .enumerate()
            .map(|(n, r)| outcome(n, *r, 0x100 + n))
            .collect();
        let terminal = outcomes.iter().position(|o| o.is_terminal());
        Sweep { nudge, outcomes, terminal }
    }

    #[test]
    fn test_safe_test_passes() {
        use crate::races::RunResult::{Interrupted as I, Normal as N};
        let test = races::find("sigsafe_read").unwrap();
        let sweeps = [sweep(Nudge::BeforeStart, &[I, I, N, N])];
        let report = RaceReport::from_sweeps(test, &sweeps, Duration::ZERO);

        assert_eq!(report.status, TestStatus::Passed);
        assert_eq!(report.fixtures[0].pattern, "IINN");
        assert_eq!(report.fixtures[0].boundary_pc, Some(0x102));
        assert!(!report.race_detected());
    }

    #[test]
    fn test_uncaught_unsafe_test_fails() {
        use crate::races::RunResult::{Interrupted as I, Normal as N};
        let test = races::find("racebefore_read").unwrap();
        let sweeps = [sweep(Nudge::BeforeStart, &[I, N])];
        let report = RaceReport::from_sweeps(test, &sweeps, Duration::ZERO);
        assert_eq!(report.status, TestStatus::Failed);
    }

    #[test]
    fn test_json_shape() {
        let test = races::find("raceafter_read").unwrap();
        let sweeps = [sweep(Nudge::BeforeStart, &[RunResult::Weird, RunResult::Normal])];
        let report = RaceReport::from_sweeps(test, &sweeps, Duration::ZERO);
        assert_eq!(report.status, TestStatus::Passed);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["test"], "raceafter_read");
        assert_eq!(json["expectation"], "unsafe");
        assert_eq!(json["fixtures"][0]["verdict"]["kind"], "weird");
        assert_eq!(json["fixtures"][0]["verdict"]["step"], 0);
    }
}
