//! Platform collaborator interface
//!
//! Architecture-specific trampoline code describes each wrapped call through
//! these traits; the registry consumes them without knowing how the
//! trampolines were produced.

use alloc::vec::Vec;

/// Addresses bounding one danger zone, as laid out by trampoline code.
///
/// `start..=end` is every instruction from which the call has not yet taken
/// effect; `landing` reports "interrupted".
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegion {
    pub start: usize,
    pub end: usize,
    pub landing: usize,
}

/// A system call entry point with a guarded region
pub trait GuardedCall: Sync {
    /// Name used in diagnostics
    fn name(&self) -> &'static str;

    /// The danger zone and landing address of this call
    fn region(&self) -> RawRegion;
}

/// A set of guarded calls contributed by one platform module
pub trait RegionSource {
    /// All guarded calls this source provides
    fn guarded_calls(&self) -> Vec<&'static dyn GuardedCall>;
}
