//! sigsafe API - Shared types for signal-safe system calls
//!
//! This crate provides the types shared between the `sigsafe` runtime and the
//! tooling built around it. It fixes two conventions every other crate in the
//! workspace relies on:
//!
//! - **Error**: usage errors of the registration API (`install_handler`,
//!   `install_tsd`, `clear_received`) are reported through [`Error`].
//! - **Syscall**: guarded system calls never report through `errno`. They
//!   return a non-negative value on success and a negated error code on
//!   failure; [`SyscallResult`] classifies such a value, and
//!   [`INTERRUPTED`] is the reserved code for "a signal arrived before the
//!   call took effect".
//!
//! # Usage
//!
//! ```rust
//! use sigsafe_api::{SyscallResult, INTERRUPTED};
//!
//! let raw: isize = INTERRUPTED;
//! assert!(SyscallResult::from_isize(raw).is_interrupted());
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod error;
pub mod syscall;

// Re-export commonly used types
pub use crate::error::{Error, Result};
pub use crate::syscall::interface::{GuardedCall, RegionSource, RawRegion};
pub use crate::syscall::types::{SyscallResult, INTERRUPTED};
