//! API convention tests

use proptest::prelude::*;
use sigsafe_api::{Error, SyscallResult, INTERRUPTED};

#[test]
fn test_syscall_result() {
    let success = SyscallResult::Success(42);
    assert_eq!(success.to_isize(), 42);

    let error = SyscallResult::Error(2);
    assert_eq!(error.to_isize(), -2);

    assert_eq!(SyscallResult::from_isize(42), SyscallResult::Success(42));
    assert_eq!(SyscallResult::from_isize(-2), SyscallResult::Error(2));
    assert_eq!(SyscallResult::from_isize(INTERRUPTED), SyscallResult::Interrupted);
}

#[test]
fn test_usage_errors_fold_to_negative_codes() {
    assert!(Error::NotInstalled.to_isize() < 0);
    assert_ne!(Error::AlreadyInstalled.to_isize(), INTERRUPTED);
}

#[test]
fn test_out_of_range_codes_do_not_overflow() {
    assert_eq!(SyscallResult::from_isize(isize::MIN), SyscallResult::Error(i32::MAX));
    assert_eq!(
        SyscallResult::from_isize(-(i32::MAX as isize) - 1),
        SyscallResult::Error(i32::MAX)
    );
    assert_eq!(
        SyscallResult::from_isize(-(i32::MAX as isize)),
        SyscallResult::Error(i32::MAX)
    );
}

proptest! {
    #[test]
    fn only_eintr_reads_as_interrupted(code in 1i32..4096) {
        let result = SyscallResult::from_isize(-(code as isize));
        prop_assert_eq!(result.is_interrupted(), code == libc::EINTR);
        prop_assert!(!result.is_success());
    }
}
