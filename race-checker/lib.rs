//! Race Checker
//!
//! Verifies that guarded calls have no signal race. For every instruction
//! boundary before a blocking read, a traced child is single-stepped to that
//! boundary, signalled, and checked: the read must either report an
//! interruption without consuming anything or complete normally, and never
//! block past a delivered signal.
//!
//! Two deliberately broken baselines (`racebefore_read`, `raceafter_read`)
//! check that the harness actually catches races.

pub mod common;
pub mod config;
pub mod driver;
pub mod fixture;
pub mod races;
pub mod report;
pub mod trace;
pub mod verdict;

use std::time::Instant;

pub use common::{RaceError, Result};
pub use config::HarnessConfig;
pub use driver::{Driver, StepOutcome, Sweep};
pub use fixture::Nudge;
pub use races::{Expectation, RaceTest, RunResult, RACES};
pub use report::{RaceReport, TestStatus};
pub use trace::{Ptrace, Tracer};
pub use verdict::Verdict;

/// Runs `test` under every fixture and summarizes the sweeps
pub fn check<T: Tracer>(driver: &mut Driver<T>, test: &RaceTest) -> RaceReport {
    let start = Instant::now();
    let mut sweeps = Vec::with_capacity(Nudge::ALL.len());

    for nudge in Nudge::ALL {
        match driver.sweep(test, nudge) {
            Ok(sweep) => sweeps.push(sweep),
            Err(RaceError::TracingUnavailable) => {
                return RaceReport::skipped(test, RaceError::TracingUnavailable.to_string());
            }
            Err(err) => return RaceReport::error(test, err.to_string()),
        }
    }

    RaceReport::from_sweeps(test, &sweeps, start.elapsed())
}

/// Runs every test in `tests`, in order
pub fn run_all<T: Tracer>(driver: &mut Driver<T>, tests: &[&RaceTest]) -> Vec<RaceReport> {
    tests
        .iter()
        .map(|test| {
            log::info!("checking {}: {}", test.name, test.description);
            let report = check(driver, test);
            report.log_summary();
            report
        })
        .collect()
}

/// Whether every report matched its expectation
pub fn all_passed(reports: &[RaceReport]) -> bool {
    reports
        .iter()
        .all(|r| matches!(r.status, TestStatus::Passed | TestStatus::Skipped))
}
