//! Error handling module for sigsafe

use alloc::string::{String, ToString};
use core::fmt;

/// Usage errors of the registration API.
///
/// Kernel failures of guarded system calls are *not* reported through this
/// type; they travel as negated error codes (see [`crate::SyscallResult`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument (out-of-range signal number, rejected by `sigaction`)
    InvalidArgument(String),
    /// Per-thread state was already installed in this thread
    AlreadyInstalled,
    /// Per-thread state has not been installed in this thread
    NotInstalled,
    /// A different callback is already registered for this signal number
    AlreadyRegistered(i32),
    /// The guarded-region registry has been frozen and can no longer change
    RegistryFrozen,
    /// A guarded region whose start lies after its end
    InvalidRegion {
        name: &'static str,
        start: usize,
        end: usize,
    },
    /// Two guarded regions share at least one instruction address
    OverlappingRegion {
        name: &'static str,
        other: &'static str,
    },
    /// Raw operating system error code
    Os(i32),
}

impl Error {
    /// The positive `errno` value closest to this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::AlreadyInstalled => libc::EBUSY,
            Error::NotInstalled => libc::EINVAL,
            Error::AlreadyRegistered(_) => libc::EBUSY,
            Error::RegistryFrozen => libc::EBUSY,
            Error::InvalidRegion { .. } => libc::EINVAL,
            Error::OverlappingRegion { .. } => libc::EINVAL,
            Error::Os(code) => *code,
        }
    }

    /// The error folded onto the negated-code channel used by guarded calls.
    pub fn to_isize(&self) -> isize {
        -(self.errno() as isize)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::AlreadyInstalled => write!(f, "Thread-specific data already installed"),
            Error::NotInstalled => write!(f, "Thread-specific data not installed"),
            Error::AlreadyRegistered(signum) => {
                write!(f, "Signal {} already has a different handler", signum)
            }
            Error::RegistryFrozen => write!(f, "Guarded-region registry is frozen"),
            Error::InvalidRegion { name, start, end } => write!(
                f,
                "Invalid guarded region {}: start {:#x} after end {:#x}",
                name, start, end
            ),
            Error::OverlappingRegion { name, other } => {
                write!(f, "Guarded region {} overlaps {}", name, other)
            }
            Error::Os(code) => write!(f, "OS error {}", code),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

/// Creates a new invalid argument error
pub fn invalid_argument(msg: &str) -> Error {
    Error::InvalidArgument(msg.to_string())
}

/// Captures the calling thread's current `errno` as an [`Error::Os`].
pub fn last_os_error() -> Error {
    // SAFETY: __errno_location always returns a valid thread-local pointer.
    Error::Os(unsafe { *libc::__errno_location() })
}
