//! sigsafe - Race-free signal delivery to blocking system calls
//!
//! A thread that blocks in `read`, `accept`, `poll` and friends cannot
//! reliably learn about a signal with a check-then-block sequence: the
//! signal may arrive after the check and before the kernel puts the thread
//! to sleep, and the wakeup is lost. This crate closes that window.
//!
//! Every blocking call is routed through a small trampoline that inspects a
//! per-thread "received" flag immediately before trapping into the kernel.
//! The instructions between that check and the trap form a *guarded region*.
//! When the signal handler finds the interrupted program counter inside a
//! guarded region, it rewrites the program counter to the trampoline's
//! landing code, which returns [`INTERRUPTED`] without performing the call.
//!
//! # Architecture
//!
//! - **Core**: guarded-region registry and user callback dispatch table
//! - **Signal**: handler installation and the handler entry point
//! - **Tsd**: per-thread received flag, user data and destructor
//! - **Arch**: trampolines and context program-counter access
//! - **FS / Network / Poll / Process / Time**: guarded call wrappers
//!
//! # Usage
//!
//! ```rust,no_run
//! use sigsafe::{install_handler, install_tsd, clear_received, INTERRUPTED};
//!
//! install_handler(libc::SIGUSR1, None).unwrap();
//! install_tsd(0, None).unwrap();
//!
//! let mut buf = [0u8; 1];
//! let n = sigsafe::fs::read(0, &mut buf);
//! if n == INTERRUPTED {
//!     clear_received().unwrap();
//! }
//! ```

#[macro_use]
mod logging;

pub mod arch;
pub mod common;
pub mod core;
pub mod fs;
pub mod network;
pub mod poll;
pub mod process;
pub mod signal;
pub mod time;
pub mod tsd;
pub mod types;

// Re-export commonly used types
pub use sigsafe_api::{Error, GuardedCall, RawRegion, RegionSource, Result, SyscallResult, INTERRUPTED};

pub use crate::core::dispatcher::UserHandler;
pub use crate::core::registry::{
    install_registry, registry, GuardedRegion, GuardedRegistry, RegistryBuilder,
};
pub use crate::fs::{read, readv, write, writev};
pub use crate::network::{accept, connect, recv, recvfrom, recvmsg, send, sendmsg, sendto};
pub use crate::poll::{epoll_wait, poll, select, PollEvents, PollFd};
pub use crate::process::{wait4, waitpid, WaitOptions};
pub use crate::signal::{install_handler, InterruptContext, InterruptInfo};
pub use crate::time::{nanosleep, pause};
pub use crate::tsd::{clear_received, install_tsd, is_installed, is_received, received_flag};
pub use crate::types::{SyscallId, NSIG};
