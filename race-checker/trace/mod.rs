//! Process tracing
//!
//! [`Tracer`] is the seam between the sweep logic and the operating
//! system's tracing facility; [`Ptrace`] implements it with `ptrace(2)`.

use std::thread;
use std::time::{Duration, Instant};

use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::common::{RaceError, Result};

/// What a traced child did while the tracer waited on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// Stopped with a signal (a completed single-step reports `SIGTRAP`)
    Stopped(Signal),
    /// Exited with a status code
    Exited(i32),
    /// Killed by a signal
    Signaled(Signal),
    /// Still running (or blocked in the kernel) when the timeout expired
    Timeout,
}

/// Operations the driver needs from a process tracer
#[cfg_attr(test, mockall::automock)]
pub trait Tracer {
    /// Resumes a stopped child for one instruction
    fn step(&mut self, pid: Pid) -> Result<()>;

    /// Waits up to `timeout` for the child to stop or exit
    fn wait_stop(&mut self, pid: Pid, timeout: Duration) -> Result<StopEvent>;

    /// Sends `signal` to a running child
    fn interrupt(&mut self, pid: Pid, signal: Signal) -> Result<()>;

    /// Releases a stopped child, delivering `signal` if given
    fn detach(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()>;

    /// Program counter of a stopped child
    fn program_counter(&mut self, pid: Pid) -> Result<usize>;

    /// Kills the child unconditionally
    fn kill(&mut self, pid: Pid) -> Result<()>;
}

/// [`Tracer`] backed by `ptrace(2)`
#[derive(Debug, Default)]
pub struct Ptrace;

/// Polls before the waiter starts sleeping between `waitpid` attempts.
/// A single-step normally completes within a few of them.
const SPIN_POLLS: u32 = 1_000;
const POLL_SLEEP: Duration = Duration::from_micros(200);

impl Tracer for Ptrace {
    fn step(&mut self, pid: Pid) -> Result<()> {
        ptrace::step(pid, None)?;
        Ok(())
    }

    fn wait_stop(&mut self, pid: Pid, timeout: Duration) -> Result<StopEvent> {
        let deadline = Instant::now() + timeout;
        let mut polls = 0u32;
        loop {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG))? {
                WaitStatus::StillAlive => {}
                WaitStatus::Stopped(_, sig) => return Ok(StopEvent::Stopped(sig)),
                WaitStatus::Exited(_, code) => return Ok(StopEvent::Exited(code)),
                WaitStatus::Signaled(_, sig, _) => return Ok(StopEvent::Signaled(sig)),
                other => return Err(RaceError::UnexpectedState(format!("{:?}", other))),
            }
            if Instant::now() >= deadline {
                return Ok(StopEvent::Timeout);
            }
            if polls < SPIN_POLLS {
                polls += 1;
                thread::yield_now();
            } else {
                thread::sleep(POLL_SLEEP);
            }
        }
    }

    fn interrupt(&mut self, pid: Pid, signal: Signal) -> Result<()> {
        signal::kill(pid, signal)?;
        Ok(())
    }

    fn detach(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        ptrace::detach(pid, signal)?;
        Ok(())
    }

    #[cfg(target_arch = "x86_64")]
    fn program_counter(&mut self, pid: Pid) -> Result<usize> {
        Ok(ptrace::getregs(pid)?.rip as usize)
    }

    #[cfg(target_arch = "aarch64")]
    fn program_counter(&mut self, pid: Pid) -> Result<usize> {
        use std::mem;

        // SAFETY: all-zero is a valid register block.
        let mut regs: libc::user_regs_struct = unsafe { mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: (&mut regs as *mut libc::user_regs_struct).cast(),
            iov_len: mem::size_of::<libc::user_regs_struct>(),
        };
        // SAFETY: `iov` describes a writable user_regs_struct.
        let rc = unsafe {
            libc::ptrace(
                libc::PTRACE_GETREGSET,
                pid.as_raw(),
                libc::NT_PRSTATUS as usize,
                &mut iov as *mut libc::iovec,
            )
        };
        nix::errno::Errno::result(rc)?;
        Ok(regs.pc as usize)
    }

    fn kill(&mut self, pid: Pid) -> Result<()> {
        match signal::kill(pid, Signal::SIGKILL) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
