//! Guarded sleeps

use std::ptr;

use crate::common::{args, guarded};
use crate::types::SyscallId;

/// Guarded `nanosleep(2)`.
///
/// When the sleep is cut short by a signal after it started, `rem` receives
/// the time left and the result is `-EINTR`.
pub fn nanosleep(req: &libc::timespec, rem: Option<&mut libc::timespec>) -> isize {
    let rem = rem.map_or(ptr::null_mut(), |r| r as *mut libc::timespec);
    // SAFETY: `req` is borrowed and `rem` is null or borrowed for the call.
    unsafe { guarded(SyscallId::Nanosleep, args!(req as *const libc::timespec, rem)) }
}

/// Guarded `pause(2)`.
///
/// Sleeps until a signal arrives. With installed per-thread state this
/// returns [`INTERRUPTED`](crate::INTERRUPTED) immediately if a signal is
/// already pending acknowledgement.
pub fn pause() -> isize {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: pause takes no arguments.
        unsafe { guarded(SyscallId::Pause, args!()) }
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: ppoll on no descriptors with no timeout and no mask.
        unsafe { guarded(SyscallId::Pause, args!(0, 0, 0, 0, crate::poll::SIGSET_SIZE)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sleep() {
        let req = libc::timespec { tv_sec: 0, tv_nsec: 1000 };
        assert_eq!(nanosleep(&req, None), 0);
    }

    #[test]
    fn test_invalid_request() {
        let req = libc::timespec { tv_sec: 0, tv_nsec: 2_000_000_000 };
        assert_eq!(nanosleep(&req, None), -(libc::EINVAL as isize));
    }
}
