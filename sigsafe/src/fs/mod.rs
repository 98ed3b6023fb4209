//! Guarded descriptor reads and writes

use std::io::{IoSlice, IoSliceMut};
use std::os::fd::RawFd;

use crate::common::{args, guarded};
use crate::types::SyscallId;

/// Guarded `read(2)`.
///
/// Returns the number of bytes read, a negated error code, or
/// [`INTERRUPTED`](crate::INTERRUPTED) without consuming any data.
pub fn read(fd: RawFd, buf: &mut [u8]) -> isize {
    // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
    unsafe { guarded(SyscallId::Read, args!(fd, buf.as_mut_ptr(), buf.len())) }
}

/// Guarded `readv(2)`
pub fn readv(fd: RawFd, bufs: &mut [IoSliceMut<'_>]) -> isize {
    // SAFETY: IoSliceMut is ABI-compatible with iovec on unix.
    unsafe { guarded(SyscallId::Readv, args!(fd, bufs.as_mut_ptr(), bufs.len())) }
}

/// Guarded `write(2)`
pub fn write(fd: RawFd, buf: &[u8]) -> isize {
    // SAFETY: `buf` is valid for `buf.len()` bytes of reads.
    unsafe { guarded(SyscallId::Write, args!(fd, buf.as_ptr(), buf.len())) }
}

/// Guarded `writev(2)`
pub fn writev(fd: RawFd, bufs: &[IoSlice<'_>]) -> isize {
    // SAFETY: IoSlice is ABI-compatible with iovec on unix.
    unsafe { guarded(SyscallId::Writev, args!(fd, bufs.as_ptr(), bufs.len())) }
}
