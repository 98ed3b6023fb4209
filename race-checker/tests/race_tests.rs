//! End-to-end race checks
//!
//! Each test forks and traces real children, so they run serially. Where
//! process tracing is unavailable (containers without `CAP_SYS_PTRACE`,
//! restrictive Yama settings) the checks are skipped.

use std::time::Duration;

use race_checker::races;
use race_checker::{
    check, Driver, HarnessConfig, Nudge, RaceReport, RaceTest, RunResult, TestStatus, Verdict,
};
use serial_test::serial;

fn driver() -> Driver {
    let _ = env_logger::builder().is_test(true).try_init();
    Driver::new(
        HarnessConfig::default()
            .with_max_steps(5_000)
            .with_step_timeout(Duration::from_millis(100)),
    )
}

fn test(name: &str) -> &'static RaceTest {
    races::find(name).unwrap()
}

fn run(name: &str) -> Option<RaceReport> {
    let report = check(&mut driver(), test(name));
    if report.status == TestStatus::Skipped {
        eprintln!("skipping {}: {:?}", name, report.error_message);
        return None;
    }
    assert_ne!(report.status, TestStatus::Error, "{:?}", report.error_message);
    Some(report)
}

fn verdict(report: &RaceReport, nudge: Nudge) -> Verdict {
    report
        .fixtures
        .iter()
        .find(|f| f.nudge == nudge)
        .map(|f| f.verdict)
        .unwrap()
}

#[test]
#[serial]
fn test_guarded_read_has_no_race() {
    let Some(report) = run("sigsafe_read") else { return };
    assert_eq!(report.status, TestStatus::Passed, "{:#?}", report);

    // Signalled early enough, the read reports the interruption; once past
    // the point of no return it completes
    match verdict(&report, Nudge::BeforeStart) {
        Verdict::Pass { boundary: Some(step) } => assert!(step > 0),
        other => panic!("unexpected verdict {:?}", other),
    }
    assert_eq!(
        verdict(&report, Nudge::AfterSignal),
        Verdict::Pass { boundary: None }
    );
}

#[test]
#[serial]
fn test_guarded_poll_then_read_has_no_race() {
    let Some(report) = run("sigsafe_poll_read") else { return };
    assert_eq!(report.status, TestStatus::Passed, "{:#?}", report);
    assert!(!report.race_detected());
}

#[test]
#[serial]
fn test_flag_check_before_plain_read_is_caught() {
    let Some(report) = run("racebefore_read") else { return };
    assert_eq!(report.status, TestStatus::Passed, "{:#?}", report);
    assert!(matches!(
        verdict(&report, Nudge::AfterSignal),
        Verdict::LostInterrupt { .. }
    ));
}

#[test]
#[serial]
fn test_span_past_kernel_call_is_caught() {
    let Some(report) = run("raceafter_read") else { return };
    assert_eq!(report.status, TestStatus::Passed, "{:#?}", report);
    assert!(matches!(
        verdict(&report, Nudge::BeforeStart),
        Verdict::Weird { .. }
    ));
}

#[test]
#[serial]
fn test_step_zero_is_interrupted() {
    let mut driver = driver();
    let outcome = match driver.run_step(test("sigsafe_read"), Nudge::BeforeStart, 0) {
        Ok(outcome) => outcome,
        Err(race_checker::RaceError::TracingUnavailable) => return,
        Err(err) => panic!("{}", err),
    };
    assert_eq!(outcome.result, RunResult::Interrupted);
    assert!(!outcome.is_terminal());
}
