//! Unified logging support for sigsafe
//!
//! The macros compile to nothing unless the `log` feature is enabled, so the
//! rest of the crate can log without repeating `#[cfg]` attributes. None of
//! them may be used from the signal handler.

/// Trace-level logging
macro_rules! sys_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }
}

/// Debug-level logging
macro_rules! sys_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }
}

/// Warn-level logging
macro_rules! sys_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    }
}
