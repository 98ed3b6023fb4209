//! System call result types

/// Reserved return value of a guarded call that was interrupted before it
/// took effect.
///
/// It is `-EINTR`, so it shares the numeric channel with ordinary kernel
/// errors. A plain `EINTR` from the kernel (a signal without a sigsafe
/// handler interrupting a non-restartable call) reports through the same
/// value; both mean "retry after handling signals".
pub const INTERRUPTED: isize = -(libc::EINTR as isize);

/// Classified result of a guarded system call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    /// Success with return value
    Success(isize),
    /// A signal arrived before the call took effect
    Interrupted,
    /// Kernel error with positive error code
    Error(i32),
}

impl SyscallResult {
    /// Classifies a raw `>= 0 | -errno` return value
    pub fn from_isize(value: isize) -> Self {
        if value >= 0 {
            SyscallResult::Success(value)
        } else if value == INTERRUPTED {
            SyscallResult::Interrupted
        } else {
            SyscallResult::Error(i32::try_from(value.unsigned_abs()).unwrap_or(i32::MAX))
        }
    }

    /// Folds the result back onto the raw channel
    pub fn to_isize(&self) -> isize {
        match self {
            SyscallResult::Success(value) => *value,
            SyscallResult::Interrupted => INTERRUPTED,
            SyscallResult::Error(code) => -(*code as isize),
        }
    }

    /// Returns true if result is success
    pub fn is_success(&self) -> bool {
        matches!(self, SyscallResult::Success(_))
    }

    /// Returns true if the call was interrupted
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyscallResult::Interrupted)
    }

    /// Returns success value if successful
    pub fn success_value(&self) -> Option<isize> {
        match self {
            SyscallResult::Success(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the kernel error code if the call failed
    pub fn error_value(&self) -> Option<i32> {
        match self {
            SyscallResult::Error(code) => Some(*code),
            SyscallResult::Interrupted => Some(libc::EINTR),
            SyscallResult::Success(_) => None,
        }
    }
}

impl From<isize> for SyscallResult {
    fn from(value: isize) -> Self {
        SyscallResult::from_isize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_is_reserved() {
        assert_eq!(SyscallResult::from_isize(INTERRUPTED), SyscallResult::Interrupted);
        assert_eq!(SyscallResult::Interrupted.error_value(), Some(libc::EINTR));
        assert!(!SyscallResult::from_isize(-(libc::EBADF as isize)).is_interrupted());
    }

    #[test]
    fn test_zero_is_success() {
        // nanosleep and pselect report plain success as zero
        assert_eq!(SyscallResult::from_isize(0).success_value(), Some(0));
    }
}
