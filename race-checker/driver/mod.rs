//! Sweep driver
//!
//! For step count N the driver forks a child that installs its state,
//! stops itself under tracing and then runs the race test. The parent
//! single-steps it N instructions, delivers the signal, writes the nudge
//! byte if the fixture calls for it and collects the child's verdict from
//! its exit status.

use std::panic::{self, AssertUnwindSafe};

use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{fork, getpid, ForkResult, Pid};
use serde::Serialize;

use crate::common::{RaceError, Result, EXIT_TRACE_UNAVAILABLE};
use crate::config::HarnessConfig;
use crate::fixture::{Nudge, Pipe};
use crate::races::{self, RaceTest, RunResult};
use crate::trace::{Ptrace, StopEvent, Tracer};

/// What happened for one step count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Steps requested
    pub steps: usize,
    /// Steps completed before the signal
    pub taken: usize,
    pub result: RunResult,
    /// The child blocked in the kernel before completing the steps
    pub blocked: bool,
    /// The child exited before completing the steps
    pub exited_early: bool,
    /// Program counter the signal was delivered at, when the child was stopped
    pub pc: Option<usize>,
}

impl StepOutcome {
    fn new(steps: usize) -> Self {
        Self {
            steps,
            taken: 0,
            result: RunResult::Weird,
            blocked: false,
            exited_early: false,
            pc: None,
        }
    }

    /// Whether larger step counts can no longer land before the call
    pub fn is_terminal(&self) -> bool {
        self.blocked || self.exited_early || self.result == RunResult::Normal
    }
}

/// Outcomes of one test under one fixture
#[derive(Debug, Clone, Serialize)]
pub struct Sweep {
    pub nudge: Nudge,
    pub outcomes: Vec<StepOutcome>,
    /// First terminal step count, if any was reached
    pub terminal: Option<usize>,
}

impl Sweep {
    pub fn results(&self) -> Vec<RunResult> {
        self.outcomes.iter().map(|o| o.result).collect()
    }
}

/// Single-steps a child already in its initial stop, signals it, and waits
/// for its exit. `after_signal` runs once the signal has been delivered.
pub fn drive<T: Tracer + ?Sized>(
    tracer: &mut T,
    pid: Pid,
    steps: usize,
    config: &HarnessConfig,
    after_signal: &mut dyn FnMut() -> Result<()>,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::new(steps);

    while outcome.taken < steps {
        tracer.step(pid)?;
        match tracer.wait_stop(pid, config.step_timeout)? {
            StopEvent::Stopped(_) => outcome.taken += 1,
            StopEvent::Timeout => {
                outcome.blocked = true;
                break;
            }
            StopEvent::Exited(code) => {
                outcome.exited_early = true;
                outcome.result = RunResult::from_exit_code(code);
                return Ok(outcome);
            }
            StopEvent::Signaled(_) => {
                outcome.exited_early = true;
                return Ok(outcome);
            }
        }
    }

    if outcome.blocked {
        tracer.interrupt(pid, config.signal)?;
        match tracer.wait_stop(pid, config.exit_timeout)? {
            StopEvent::Stopped(sig) if sig == config.signal => {
                tracer.detach(pid, Some(config.signal))?
            }
            // The step finished first; the signal stays pending
            StopEvent::Stopped(_) => tracer.detach(pid, None)?,
            StopEvent::Exited(code) => {
                outcome.result = RunResult::from_exit_code(code);
                return Ok(outcome);
            }
            StopEvent::Signaled(_) => return Ok(outcome),
            StopEvent::Timeout => {
                reap(tracer, pid, config)?;
                return Ok(outcome);
            }
        }
    } else {
        outcome.pc = tracer.program_counter(pid).ok();
        tracer.detach(pid, Some(config.signal))?;
    }

    after_signal()?;

    outcome.result = match tracer.wait_stop(pid, config.exit_timeout)? {
        StopEvent::Exited(code) => RunResult::from_exit_code(code),
        StopEvent::Signaled(_) => RunResult::Weird,
        StopEvent::Stopped(_) | StopEvent::Timeout => {
            log::debug!("child {} did not exit after {} steps", pid, steps);
            reap(tracer, pid, config)?;
            RunResult::Weird
        }
    };
    Ok(outcome)
}

fn reap<T: Tracer + ?Sized>(tracer: &mut T, pid: Pid, config: &HarnessConfig) -> Result<()> {
    tracer.kill(pid)?;
    match tracer.wait_stop(pid, config.exit_timeout)? {
        StopEvent::Exited(_) | StopEvent::Signaled(_) => Ok(()),
        other => Err(RaceError::UnexpectedState(format!(
            "child {} survived SIGKILL: {:?}",
            pid, other
        ))),
    }
}

/// Runs sweeps with a concrete tracer
pub struct Driver<T: Tracer = Ptrace> {
    tracer: T,
    config: HarnessConfig,
}

impl Driver<Ptrace> {
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_tracer(Ptrace, config)
    }
}

impl<T: Tracer> Driver<T> {
    pub fn with_tracer(tracer: T, config: HarnessConfig) -> Self {
        Self { tracer, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs `test` once, delivering the signal after `steps` instructions.
    ///
    /// # Errors
    ///
    /// [`RaceError::TracingUnavailable`] if the child cannot be traced.
    pub fn run_step(&mut self, test: &RaceTest, nudge: Nudge, steps: usize) -> Result<StepOutcome> {
        races::install_registry()?;

        let pipe = Pipe::new()?;
        if nudge == Nudge::BeforeStart {
            pipe.nudge()?;
        }

        let pid = spawn_child(test, &pipe, &self.config)?;
        match self.tracer.wait_stop(pid, self.config.exit_timeout)? {
            StopEvent::Stopped(Signal::SIGSTOP) => {}
            StopEvent::Exited(EXIT_TRACE_UNAVAILABLE) => return Err(RaceError::TracingUnavailable),
            other => {
                let _ = reap(&mut self.tracer, pid, &self.config);
                return Err(RaceError::UnexpectedState(format!(
                    "child {} did not stop for tracing: {:?}",
                    pid, other
                )));
            }
        }

        let mut after_signal = || match nudge {
            Nudge::AfterSignal => pipe.nudge(),
            Nudge::BeforeStart => Ok(()),
        };
        let outcome = drive(&mut self.tracer, pid, steps, &self.config, &mut after_signal);
        if outcome.is_err() {
            let _ = reap(&mut self.tracer, pid, &self.config);
        }
        outcome
    }

    /// Runs `test` for step counts `0..` until the first terminal step plus
    /// the configured overshoot, or until `max_steps`.
    pub fn sweep(&mut self, test: &RaceTest, nudge: Nudge) -> Result<Sweep> {
        let mut sweep = Sweep {
            nudge,
            outcomes: Vec::new(),
            terminal: None,
        };

        for steps in 0..=self.config.max_steps {
            let outcome = self.run_step(test, nudge, steps)?;
            log::trace!(
                "{} {} N={}: {:?}{}",
                test.name,
                nudge.name(),
                steps,
                outcome.result,
                outcome.pc.map(|pc| format!(" at {:#x}", pc)).unwrap_or_default()
            );

            if sweep.terminal.is_none() && outcome.is_terminal() {
                sweep.terminal = Some(steps);
            }
            sweep.outcomes.push(outcome);

            if sweep
                .terminal
                .is_some_and(|terminal| steps >= terminal + self.config.overshoot)
            {
                break;
            }
        }

        if sweep.terminal.is_none() {
            log::warn!(
                "{} {}: no terminal step within {} steps",
                test.name,
                nudge.name(),
                self.config.max_steps
            );
        }
        Ok(sweep)
    }
}

fn spawn_child(test: &RaceTest, pipe: &Pipe, config: &HarnessConfig) -> Result<Pid> {
    // SAFETY: the child only runs the race test and leaves through `_exit`.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => child_main(test, pipe, config),
    }
}

fn child_main(test: &RaceTest, pipe: &Pipe, config: &HarnessConfig) -> ! {
    let code = exit_code_of(|| child_body(test, pipe, config));
    // SAFETY: leaves without running the parent's atexit handlers.
    unsafe { libc::_exit(code) }
}

/// Runs the child body, mapping a panic to `Weird`.
///
/// Release and dev binaries abort on panic, which the parent already sees as
/// `Weird`. Test binaries unwind, and an unwinding child must not return
/// into the forked copy of the test runner.
fn exit_code_of(body: impl FnOnce() -> i32) -> i32 {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(RunResult::Weird.exit_code())
}

fn child_body(test: &RaceTest, pipe: &Pipe, config: &HarnessConfig) -> i32 {
    if sigsafe::install_tsd(0, None).is_err()
        || sigsafe::install_handler(config.signal as i32, None).is_err()
    {
        return RunResult::Weird.exit_code();
    }
    if ptrace::traceme().is_err() {
        return EXIT_TRACE_UNAVAILABLE;
    }
    if kill(getpid(), Signal::SIGSTOP).is_err() {
        return RunResult::Weird.exit_code();
    }

    let result = test.run(pipe.read_fd());
    if result == RunResult::Interrupted && !pipe.nudge_pending(config.nudge_timeout) {
        // Reported as interrupted, yet the byte is gone
        return RunResult::Weird.exit_code();
    }
    result.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::MockTracer;
    use std::cell::Cell;
    use std::time::Duration;

    fn config() -> HarnessConfig {
        HarnessConfig::default().with_step_timeout(Duration::from_millis(1))
    }

    fn pid() -> Pid {
        Pid::from_raw(4242)
    }

    fn scripted(events: Vec<StopEvent>) -> MockTracer {
        let mut events = events.into_iter();
        let mut tracer = MockTracer::new();
        tracer
            .expect_wait_stop()
            .returning(move |_, _| Ok(events.next().unwrap_or(StopEvent::Timeout)));
        tracer
    }

    #[test]
    fn test_signal_after_steps() {
        let mut tracer = scripted(vec![
            StopEvent::Stopped(Signal::SIGTRAP),
            StopEvent::Stopped(Signal::SIGTRAP),
            StopEvent::Exited(RunResult::Interrupted.exit_code()),
        ]);
        tracer.expect_step().times(2).returning(|_| Ok(()));
        tracer.expect_program_counter().times(1).returning(|_| Ok(0x1000));
        tracer
            .expect_detach()
            .withf(|_, signal| *signal == Some(Signal::SIGUSR1))
            .times(1)
            .returning(|_, _| Ok(()));

        let nudged = Cell::new(false);
        let outcome = drive(&mut tracer, pid(), 2, &config(), &mut || {
            nudged.set(true);
            Ok(())
        })
        .unwrap();

        assert!(nudged.get());
        assert_eq!(outcome.taken, 2);
        assert_eq!(outcome.pc, Some(0x1000));
        assert_eq!(outcome.result, RunResult::Interrupted);
        assert!(!outcome.is_terminal());
    }

    #[test]
    fn test_blocked_child_is_interrupted() {
        let mut tracer = scripted(vec![
            StopEvent::Stopped(Signal::SIGTRAP),
            StopEvent::Timeout,
            StopEvent::Stopped(Signal::SIGUSR1),
            StopEvent::Exited(RunResult::Normal.exit_code()),
        ]);
        tracer.expect_step().times(2).returning(|_| Ok(()));
        tracer
            .expect_interrupt()
            .withf(|_, signal| *signal == Signal::SIGUSR1)
            .times(1)
            .returning(|_, _| Ok(()));
        tracer
            .expect_detach()
            .withf(|_, signal| *signal == Some(Signal::SIGUSR1))
            .times(1)
            .returning(|_, _| Ok(()));
        tracer.expect_program_counter().never();

        let outcome = drive(&mut tracer, pid(), 5, &config(), &mut || Ok(())).unwrap();
        assert!(outcome.blocked);
        assert_eq!(outcome.taken, 1);
        assert_eq!(outcome.result, RunResult::Normal);
        assert!(outcome.is_terminal());
    }

    #[test]
    fn test_exit_during_stepping() {
        let mut tracer = scripted(vec![StopEvent::Exited(RunResult::Normal.exit_code())]);
        tracer.expect_step().times(1).returning(|_| Ok(()));
        tracer.expect_detach().never();

        let outcome = drive(&mut tracer, pid(), 10, &config(), &mut || -> Result<()> {
            panic!("no signal was delivered")
        })
        .unwrap();
        assert!(outcome.exited_early);
        assert_eq!(outcome.result, RunResult::Normal);
    }

    #[test]
    fn test_child_panic_exits_weird() {
        assert_eq!(exit_code_of(|| RunResult::Normal.exit_code()), 2);
        assert_eq!(exit_code_of(|| panic!("race test blew up")), RunResult::Weird.exit_code());
    }

    #[test]
    fn test_hung_child_is_weird() {
        let mut tracer = scripted(vec![
            StopEvent::Timeout,
            StopEvent::Signaled(Signal::SIGKILL),
        ]);
        tracer.expect_program_counter().returning(|_| Ok(0x2000));
        tracer.expect_detach().returning(|_, _| Ok(()));
        tracer.expect_kill().times(1).returning(|_| Ok(()));

        let outcome = drive(&mut tracer, pid(), 0, &config(), &mut || Ok(())).unwrap();
        assert_eq!(outcome.result, RunResult::Weird);
    }
}
