//! Guarded socket calls
//!
//! The calls that take socket addresses or message headers keep the raw
//! `libc` argument types and are `unsafe`, like the functions they mirror.

use std::os::fd::RawFd;

use crate::common::{args, guarded};
use crate::types::SyscallId;

/// Guarded `accept(2)`.
///
/// # Safety
///
/// `addr` and `addrlen` must both be null or point to a writable address
/// buffer and its length.
pub unsafe fn accept(fd: RawFd, addr: *mut libc::sockaddr, addrlen: *mut libc::socklen_t) -> isize {
    unsafe { guarded(SyscallId::Accept, args!(fd, addr, addrlen)) }
}

/// Guarded `connect(2)`.
///
/// A connect interrupted after it reached the kernel continues
/// asynchronously, exactly as with `EINTR` from the plain call.
///
/// # Safety
///
/// `addr` must point to `addrlen` readable bytes.
pub unsafe fn connect(fd: RawFd, addr: *const libc::sockaddr, addrlen: libc::socklen_t) -> isize {
    unsafe { guarded(SyscallId::Connect, args!(fd, addr, addrlen)) }
}

/// Guarded `recv(2)`, performed as `recvfrom` without an address
pub fn recv(fd: RawFd, buf: &mut [u8], flags: i32) -> isize {
    // SAFETY: `buf` is valid for writes; the address arguments are null.
    unsafe { recvfrom(fd, buf, flags, std::ptr::null_mut(), std::ptr::null_mut()) }
}

/// Guarded `recvfrom(2)`.
///
/// # Safety
///
/// `addr` and `addrlen` must both be null or point to a writable address
/// buffer and its length.
pub unsafe fn recvfrom(
    fd: RawFd,
    buf: &mut [u8],
    flags: i32,
    addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
) -> isize {
    unsafe {
        guarded(
            SyscallId::Recvfrom,
            args!(fd, buf.as_mut_ptr(), buf.len(), flags, addr, addrlen),
        )
    }
}

/// Guarded `send(2)`, performed as `sendto` without an address
pub fn send(fd: RawFd, buf: &[u8], flags: i32) -> isize {
    // SAFETY: `buf` is valid for reads; the address is null.
    unsafe { sendto(fd, buf, flags, std::ptr::null(), 0) }
}

/// Guarded `sendto(2)`.
///
/// # Safety
///
/// `addr` must be null or point to `addrlen` readable bytes.
pub unsafe fn sendto(
    fd: RawFd,
    buf: &[u8],
    flags: i32,
    addr: *const libc::sockaddr,
    addrlen: libc::socklen_t,
) -> isize {
    unsafe {
        guarded(
            SyscallId::Sendto,
            args!(fd, buf.as_ptr(), buf.len(), flags, addr, addrlen),
        )
    }
}

/// Guarded `recvmsg(2)`.
///
/// # Safety
///
/// `msg` must point to a `msghdr` whose buffers are valid for writes.
pub unsafe fn recvmsg(fd: RawFd, msg: *mut libc::msghdr, flags: i32) -> isize {
    unsafe { guarded(SyscallId::Recvmsg, args!(fd, msg, flags)) }
}

/// Guarded `sendmsg(2)`.
///
/// # Safety
///
/// `msg` must point to a `msghdr` whose buffers are valid for reads.
pub unsafe fn sendmsg(fd: RawFd, msg: *const libc::msghdr, flags: i32) -> isize {
    unsafe { guarded(SyscallId::Sendmsg, args!(fd, msg, flags)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_pair() -> [RawFd; 2] {
        let mut fds = [0; 2];
        let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        fds
    }

    #[test]
    fn test_send_recv() {
        let [a, b] = socket_pair();
        assert_eq!(send(a, b"ping", 0), 4);
        let mut buf = [0u8; 8];
        assert_eq!(recv(b, &mut buf, 0), 4);
        assert_eq!(&buf[..4], b"ping");
        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn test_accept_on_non_socket() {
        let ret = unsafe { accept(-1, std::ptr::null_mut(), std::ptr::null_mut()) };
        assert_eq!(ret, -(libc::EBADF as isize));
    }
}
