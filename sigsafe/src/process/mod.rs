//! Guarded process waits

use std::ptr;

use bitflags::bitflags;

use crate::common::{args, guarded};
use crate::types::SyscallId;

bitflags! {
    /// `wait4(2)` options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WaitOptions: i32 {
        const NOHANG = libc::WNOHANG;
        const UNTRACED = libc::WUNTRACED;
        const CONTINUED = libc::WCONTINUED;
        /// Wait for clone children as well (`__WALL`)
        const ALL = libc::__WALL;
    }
}

/// Guarded `wait4(2)`.
///
/// Returns the reaped pid, 0 with [`WaitOptions::NOHANG`] if nothing changed
/// state, or a negated error code.
pub fn wait4(
    pid: libc::pid_t,
    status: Option<&mut i32>,
    options: WaitOptions,
    rusage: Option<&mut libc::rusage>,
) -> isize {
    let status = status.map_or(ptr::null_mut(), |s| s as *mut i32);
    let rusage = rusage.map_or(ptr::null_mut(), |r| r as *mut libc::rusage);
    // SAFETY: both pointers are null or borrowed for the call.
    unsafe { guarded(SyscallId::Wait4, args!(pid, status, options.bits(), rusage)) }
}

/// Guarded `waitpid(2)`, performed as `wait4` without resource usage
pub fn waitpid(pid: libc::pid_t, status: Option<&mut i32>, options: WaitOptions) -> isize {
    wait4(pid, status, options, None)
}
