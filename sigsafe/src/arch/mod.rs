//! Architecture-specific trampolines and context access
//!
//! Each guarded system call has an assembly trampoline with one uniform
//! calling convention: the address of the calling thread's received flag
//! followed by the six raw system call arguments. The trampoline loads the
//! flag; if it is set, it branches to its landing code and returns
//! [`INTERRUPTED`](sigsafe_api::INTERRUPTED). Otherwise it traps into the
//! kernel and returns the raw kernel result.
//!
//! Alongside each trampoline the assembler emits a read-only descriptor
//! holding the addresses of the flag check, the trap instruction and the
//! landing code. [`Platform`] exposes those descriptors as a
//! [`RegionSource`] for the guarded-region registry.

use core::fmt;
use core::sync::atomic::AtomicUsize;

use sigsafe_api::{GuardedCall, RawRegion, RegionSource};

use crate::types::SyscallId;

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod x86_64;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub(crate) use self::x86_64::{context_pc, set_context_pc, TRAMPOLINES};

#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
mod aarch64;
#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
pub(crate) use self::aarch64::{context_pc, set_context_pc, TRAMPOLINES};

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
compile_error!("sigsafe supports Linux on x86_64 and aarch64 only");

/// Entry point shared by every trampoline
pub type TrampolineFn =
    unsafe extern "C" fn(*const AtomicUsize, usize, usize, usize, usize, usize, usize) -> isize;

/// One assembly trampoline and its guarded-region descriptor
pub struct Trampoline {
    id: SyscallId,
    entry: TrampolineFn,
    descriptor: fn() -> RawRegion,
}

impl Trampoline {
    pub(crate) const fn new(
        id: SyscallId,
        entry: TrampolineFn,
        descriptor: fn() -> RawRegion,
    ) -> Self {
        Self { id, entry, descriptor }
    }

    /// The guarded call this trampoline performs
    pub fn id(&self) -> SyscallId {
        self.id
    }

    /// Runs the trampoline.
    ///
    /// # Safety
    ///
    /// `flag` must point to a live `AtomicUsize` and `args` must be valid
    /// arguments for the underlying system call.
    pub unsafe fn call(&self, flag: *const AtomicUsize, args: [usize; 6]) -> isize {
        let [a1, a2, a3, a4, a5, a6] = args;
        unsafe { (self.entry)(flag, a1, a2, a3, a4, a5, a6) }
    }
}

impl GuardedCall for Trampoline {
    fn name(&self) -> &'static str {
        self.id.name()
    }

    fn region(&self) -> RawRegion {
        (self.descriptor)()
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = self.region();
        f.debug_struct("Trampoline")
            .field("id", &self.id)
            .field("start", &format_args!("{:#x}", region.start))
            .field("end", &format_args!("{:#x}", region.end))
            .field("landing", &format_args!("{:#x}", region.landing))
            .finish()
    }
}

/// Returns the trampoline for a guarded call.
pub fn trampoline(id: SyscallId) -> &'static Trampoline {
    &TRAMPOLINES[id as usize]
}

/// The guarded regions built into this crate for the current target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Platform;

impl RegionSource for Platform {
    fn guarded_calls(&self) -> Vec<&'static dyn GuardedCall> {
        TRAMPOLINES
            .iter()
            .map(|trampoline| trampoline as &'static dyn GuardedCall)
            .collect()
    }
}
