//! Guarded readiness waits
//!
//! Only level-triggered waits are meaningful here: an interrupted
//! edge-triggered wait can lose the edge it would have reported.

use std::os::fd::RawFd;
use std::ptr;

use bitflags::bitflags;
use static_assertions::assert_eq_size;

use crate::common::{args, guarded};
use crate::types::SyscallId;

bitflags! {
    /// `poll(2)` event bits
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PollEvents: i16 {
        const IN = libc::POLLIN;
        const PRI = libc::POLLPRI;
        const OUT = libc::POLLOUT;
        const ERR = libc::POLLERR;
        const HUP = libc::POLLHUP;
        const NVAL = libc::POLLNVAL;
    }
}

/// One descriptor to wait on, laid out like `struct pollfd`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFd {
    pub fd: RawFd,
    pub events: PollEvents,
    pub revents: PollEvents,
}

assert_eq_size!(PollFd, libc::pollfd);

impl PollFd {
    /// Waits for `events` on `fd`
    pub fn new(fd: RawFd, events: PollEvents) -> Self {
        Self {
            fd,
            events,
            revents: PollEvents::empty(),
        }
    }
}

/// Guarded `poll(2)`. A negative `timeout_ms` waits forever.
pub fn poll(fds: &mut [PollFd], timeout_ms: i32) -> isize {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: PollFd matches struct pollfd.
        unsafe { guarded(SyscallId::Poll, args!(fds.as_mut_ptr(), fds.len(), timeout_ms)) }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let timeout = (timeout_ms >= 0).then(|| millis_to_timespec(timeout_ms));
        let timeout_ptr = timeout.as_ref().map_or(ptr::null(), |t| t as *const libc::timespec);
        // SAFETY: PollFd matches struct pollfd; the timeout outlives the call.
        unsafe {
            guarded(
                SyscallId::Poll,
                args!(fds.as_mut_ptr(), fds.len(), timeout_ptr, 0, SIGSET_SIZE),
            )
        }
    }
}

/// Guarded `select(2)`.
///
/// The timeout is updated with the time not slept on x86_64 only.
pub fn select(
    nfds: i32,
    readfds: Option<&mut libc::fd_set>,
    writefds: Option<&mut libc::fd_set>,
    errorfds: Option<&mut libc::fd_set>,
    timeout: Option<&mut libc::timeval>,
) -> isize {
    let readfds = readfds.map_or(ptr::null_mut(), |s| s as *mut libc::fd_set);
    let writefds = writefds.map_or(ptr::null_mut(), |s| s as *mut libc::fd_set);
    let errorfds = errorfds.map_or(ptr::null_mut(), |s| s as *mut libc::fd_set);

    #[cfg(target_arch = "x86_64")]
    {
        let timeout = timeout.map_or(ptr::null_mut(), |t| t as *mut libc::timeval);
        // SAFETY: every pointer is null or borrowed for the call.
        unsafe {
            guarded(
                SyscallId::Select,
                args!(nfds, readfds, writefds, errorfds, timeout),
            )
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let timeout = timeout.map(|t| libc::timespec {
            tv_sec: t.tv_sec,
            tv_nsec: t.tv_usec * 1000,
        });
        let timeout_ptr = timeout.as_ref().map_or(ptr::null(), |t| t as *const libc::timespec);
        // SAFETY: every pointer is null or borrowed for the call.
        unsafe {
            guarded(
                SyscallId::Select,
                args!(nfds, readfds, writefds, errorfds, timeout_ptr, 0),
            )
        }
    }
}

/// Guarded `epoll_wait(2)`
pub fn epoll_wait(epfd: RawFd, events: &mut [libc::epoll_event], timeout_ms: i32) -> isize {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: `events` is valid for `events.len()` writes.
        unsafe {
            guarded(
                SyscallId::EpollWait,
                args!(epfd, events.as_mut_ptr(), events.len(), timeout_ms),
            )
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: `events` is valid for `events.len()` writes; no sigmask.
        unsafe {
            guarded(
                SyscallId::EpollWait,
                args!(epfd, events.as_mut_ptr(), events.len(), timeout_ms, 0, SIGSET_SIZE),
            )
        }
    }
}

/// Kernel sigset size passed alongside a null mask
#[cfg(target_arch = "aarch64")]
pub(crate) const SIGSET_SIZE: usize = 8;

#[cfg(target_arch = "aarch64")]
fn millis_to_timespec(ms: i32) -> libc::timespec {
    libc::timespec {
        tv_sec: (ms / 1000) as libc::time_t,
        tv_nsec: ((ms % 1000) as libc::c_long) * 1_000_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> [RawFd; 2] {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        fds
    }

    #[test]
    fn test_poll_ready_and_timeout() {
        let [r, w] = pipe();
        let mut fds = [PollFd::new(r, PollEvents::IN)];
        assert_eq!(poll(&mut fds, 0), 0);

        assert_eq!(crate::fs::write(w, b"x"), 1);
        assert_eq!(poll(&mut fds, 1000), 1);
        assert!(fds[0].revents.contains(PollEvents::IN));
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_select_zero_timeout() {
        let [r, w] = pipe();
        let mut set: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe { libc::FD_SET(r, &mut set) };
        let mut timeout = libc::timeval { tv_sec: 0, tv_usec: 0 };
        assert_eq!(select(r + 1, Some(&mut set), None, None, Some(&mut timeout)), 0);
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_epoll_wait_reports_readable() {
        let [r, w] = pipe();
        let epfd = unsafe { libc::epoll_create1(0) };
        assert!(epfd >= 0);
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: r as u64,
        };
        assert_eq!(unsafe { libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, r, &mut event) }, 0);
        assert_eq!(crate::fs::write(w, b"x"), 1);

        let mut events = [libc::epoll_event { events: 0, u64: 0 }; 4];
        assert_eq!(epoll_wait(epfd, &mut events, 1000), 1);
        assert_eq!({ events[0].u64 }, r as u64);
        unsafe {
            libc::close(epfd);
            libc::close(r);
            libc::close(w);
        }
    }
}
