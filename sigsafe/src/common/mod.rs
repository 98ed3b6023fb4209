//! Common guarded call plumbing
//!
//! Every wrapper funnels through [`guarded`], which resolves the calling
//! thread's received flag and runs the matching trampoline.

use crate::arch;
use crate::types::SyscallId;

/// Runs a guarded system call with raw arguments.
///
/// Returns the raw kernel result: non-negative on success, a negated error
/// code on failure, and [`INTERRUPTED`](crate::INTERRUPTED) if a signal had
/// already been received when the call was about to trap.
///
/// # Safety
///
/// `args` must be valid for the system call `id` wraps, exactly as for a
/// raw `syscall(2)`.
pub unsafe fn guarded(id: SyscallId, args: [usize; 6]) -> isize {
    let flag = crate::tsd::received_flag();
    // SAFETY: the flag belongs to the calling thread and outlives the call.
    unsafe { arch::trampoline(id).call(flag, args) }
}

/// Packs up to six arguments for [`guarded`], padding with zero.
macro_rules! args {
    ($($arg:expr),* $(,)?) => {{
        let mut packed = [0usize; 6];
        let values: &[usize] = &[$($arg as usize),*];
        packed[..values.len()].copy_from_slice(values);
        packed
    }};
}

pub(crate) use args;
