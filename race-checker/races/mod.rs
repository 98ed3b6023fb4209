//! Race tests
//!
//! Each test performs one blocking read of the nudge byte in the traced
//! child and reports what happened through the child's exit status. The
//! safe tests use guarded calls; the unsafe ones are known-bad patterns the
//! harness must catch.

pub mod raceafter;

use std::os::fd::RawFd;

use serde::{Deserialize, Serialize};
use sigsafe::{Error, PollEvents, PollFd, RegistryBuilder, INTERRUPTED};

use crate::common::Result;
use crate::fixture::NUDGE_BYTE;

/// Outcome of one run, encoded in the child's exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum RunResult {
    /// The call reported an interruption and consumed nothing
    Interrupted = 1,
    /// The call completed and read the nudge byte
    Normal = 2,
    /// Anything else: wrong data, lost data, hang or crash
    Weird = 3,
}

impl RunResult {
    pub fn exit_code(self) -> i32 {
        self as i32
    }

    pub fn from_exit_code(code: i32) -> Self {
        match code {
            1 => RunResult::Interrupted,
            2 => RunResult::Normal,
            _ => RunResult::Weird,
        }
    }

    /// One-letter form used in sweep summaries
    pub fn symbol(self) -> char {
        match self {
            RunResult::Interrupted => 'I',
            RunResult::Normal => 'N',
            RunResult::Weird => 'W',
        }
    }
}

/// Whether a test is expected to survive every instruction boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Safe,
    Unsafe,
}

/// One race test
#[derive(Debug)]
pub struct RaceTest {
    pub name: &'static str,
    pub description: &'static str,
    pub expectation: Expectation,
    run: fn(RawFd) -> RunResult,
}

impl RaceTest {
    /// Performs the read in the calling (child) process
    pub fn run(&self, fd: RawFd) -> RunResult {
        (self.run)(fd)
    }
}

/// Every race test the harness knows
pub static RACES: [RaceTest; 4] = [
    RaceTest {
        name: "sigsafe_read",
        description: "guarded read",
        expectation: Expectation::Safe,
        run: sigsafe_read,
    },
    RaceTest {
        name: "sigsafe_poll_read",
        description: "guarded poll, then guarded read",
        expectation: Expectation::Safe,
        run: sigsafe_poll_read,
    },
    RaceTest {
        name: "racebefore_read",
        description: "check the flag, then a plain read",
        expectation: Expectation::Unsafe,
        run: racebefore_read,
    },
    RaceTest {
        name: "raceafter_read",
        description: "guarded span extends past the kernel call",
        expectation: Expectation::Unsafe,
        run: raceafter_read,
    },
];

/// Looks a race test up by name
pub fn find(name: &str) -> Option<&'static RaceTest> {
    RACES.iter().find(|race| race.name == name)
}

/// Publishes the platform registry plus the faulty span used by
/// `raceafter_read`. Must run before any handler is installed.
pub fn install_registry() -> Result<()> {
    let mut builder = RegistryBuilder::new().with_platform()?;
    builder.add(raceafter::region())?;

    match sigsafe::install_registry(builder.freeze()) {
        Ok(()) => Ok(()),
        Err(Error::RegistryFrozen) if has_raceafter_span() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn has_raceafter_span() -> bool {
    sigsafe::registry().is_some_and(|r| r.find(raceafter::NAME).is_some())
}

fn classify_read(ret: isize, byte: u8) -> RunResult {
    match ret {
        INTERRUPTED => RunResult::Interrupted,
        1 if byte == NUDGE_BYTE => RunResult::Normal,
        _ => RunResult::Weird,
    }
}

fn sigsafe_read(fd: RawFd) -> RunResult {
    let mut byte = [0u8; 1];
    let ret = sigsafe::read(fd, &mut byte);
    classify_read(ret, byte[0])
}

fn sigsafe_poll_read(fd: RawFd) -> RunResult {
    let mut fds = [PollFd::new(fd, PollEvents::IN)];
    match sigsafe::poll(&mut fds, -1) {
        INTERRUPTED => return RunResult::Interrupted,
        1 => {}
        _ => return RunResult::Weird,
    }
    sigsafe_read(fd)
}

fn racebefore_read(fd: RawFd) -> RunResult {
    if sigsafe::is_received() {
        return RunResult::Interrupted;
    }
    let mut byte = [0u8; 1];
    // SAFETY: `byte` is valid for one byte of writes.
    let ret = unsafe { libc::read(fd, byte.as_mut_ptr().cast(), 1) };
    if ret == -1 && nix::errno::Errno::last() == nix::errno::Errno::EINTR {
        return RunResult::Interrupted;
    }
    classify_read(ret, byte[0])
}

fn raceafter_read(fd: RawFd) -> RunResult {
    let mut byte = [0u8; 1];
    let ret = raceafter::read(fd, &mut byte);
    classify_read(ret, byte[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        for result in [RunResult::Interrupted, RunResult::Normal, RunResult::Weird] {
            assert_eq!(RunResult::from_exit_code(result.exit_code()), result);
        }
        assert_eq!(RunResult::from_exit_code(0), RunResult::Weird);
        assert_eq!(RunResult::from_exit_code(101), RunResult::Weird);
    }

    #[test]
    fn test_classify_read() {
        assert_eq!(classify_read(INTERRUPTED, 0), RunResult::Interrupted);
        assert_eq!(classify_read(1, NUDGE_BYTE), RunResult::Normal);
        assert_eq!(classify_read(1, 0), RunResult::Weird);
        assert_eq!(classify_read(0, 0), RunResult::Weird);
        assert_eq!(classify_read(-(libc::EBADF as isize), 0), RunResult::Weird);
    }

    #[test]
    fn test_find() {
        assert_eq!(find("sigsafe_read").map(|r| r.expectation), Some(Expectation::Safe));
        assert_eq!(find("raceafter_read").map(|r| r.expectation), Some(Expectation::Unsafe));
        assert!(find("missing").is_none());
    }
}
