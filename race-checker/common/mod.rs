//! Shared harness types

use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors raised by the harness itself, as opposed to race outcomes
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("process tracing is unavailable in this environment")]
    TracingUnavailable,

    #[error("unexpected child state: {0}")]
    UnexpectedState(String),

    #[error("unknown race test {0:?}")]
    UnknownTest(String),

    #[error("guarded-region registry: {0}")]
    Sigsafe(#[from] sigsafe_api::Error),

    #[error("system call failed: {0}")]
    Nix(#[from] nix::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, RaceError>;

/// Exit status a child uses when it cannot be traced
pub const EXIT_TRACE_UNAVAILABLE: i32 = 4;

/// Signal the harness stops and interrupts children with by default
pub const DEFAULT_SIGNAL: Signal = Signal::SIGUSR1;
