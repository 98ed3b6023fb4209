//! Pipe fixture
//!
//! Each race test reads one byte from a pipe. The byte is written either
//! before the child starts, so the read never blocks, or after the signal,
//! so the read blocks until the signal has been delivered.

use std::os::fd::RawFd;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags};
use nix::unistd::{close, pipe, read, write};
use serde::{Deserialize, Serialize};

use crate::common::{RaceError, Result};

/// Byte written to wake a reader
pub const NUDGE_BYTE: u8 = 26;

/// When the nudge byte is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nudge {
    /// Before the child is forked; the read has data available
    BeforeStart,
    /// After the signal was delivered; the read blocks first
    AfterSignal,
}

impl Nudge {
    pub const ALL: [Nudge; 2] = [Nudge::BeforeStart, Nudge::AfterSignal];

    pub fn name(self) -> &'static str {
        match self {
            Nudge::BeforeStart => "before-start",
            Nudge::AfterSignal => "after-signal",
        }
    }
}

/// A pipe whose read end the race tests consume
#[derive(Debug)]
pub struct Pipe {
    read: RawFd,
    write: RawFd,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let (read, write) = pipe()?;
        Ok(Self { read, write })
    }

    /// Descriptor the race test reads from
    pub fn read_fd(&self) -> RawFd {
        self.read
    }

    /// Writes the nudge byte
    pub fn nudge(&self) -> Result<()> {
        match write(self.write, &[NUDGE_BYTE])? {
            1 => Ok(()),
            n => Err(RaceError::UnexpectedState(format!("nudge wrote {} bytes", n))),
        }
    }

    /// Whether the nudge byte is (or becomes, within `timeout`) readable.
    ///
    /// Consumes the byte. Used by children that reported an interruption to
    /// prove the interrupted call did not swallow it.
    pub fn nudge_pending(&self, timeout: Duration) -> bool {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut fds = [PollFd::new(self.read, PollFlags::POLLIN)];
        if !matches!(poll(&mut fds, millis), Ok(n) if n > 0) {
            return false;
        }
        let mut byte = [0u8; 1];
        matches!(read(self.read, &mut byte), Ok(1)) && byte[0] == NUDGE_BYTE
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        let _ = close(self.read);
        let _ = close(self.write);
    }
}
