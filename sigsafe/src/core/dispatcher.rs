//! Per-signal callback table
//!
//! The signal handler looks up a user callback by signal number. Slots are
//! plain atomics holding function pointers so the lookup is lock-free, and
//! each slot is written at most once: registering a different callback for
//! an occupied slot is refused.

use core::sync::atomic::{AtomicUsize, Ordering};

use sigsafe_api::{Error, Result};

use crate::signal::{InterruptContext, InterruptInfo};
use crate::types::NSIG;

/// Callback run inside the signal handler of a thread with installed state.
///
/// Receives the signal number, the signal information, the interrupted
/// context and the thread's user value. It runs in signal context and must
/// only do async-signal-safe work.
pub type UserHandler = fn(i32, &InterruptInfo<'_>, &mut InterruptContext, usize);

const UNREGISTERED: usize = 0;
/// Registered with no callback. Never a valid code address.
const NO_CALLBACK: usize = 1;

/// Table of callbacks indexed by signal number
pub struct DispatchTable {
    slots: [AtomicUsize; NSIG],
}

impl DispatchTable {
    /// Creates an empty table
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicUsize::new(UNREGISTERED) }; NSIG],
        }
    }

    fn slot(&self, signum: i32) -> Option<&AtomicUsize> {
        usize::try_from(signum)
            .ok()
            .filter(|&n| n >= 1)
            .and_then(|n| self.slots.get(n))
    }

    /// Registers `handler` for `signum`.
    ///
    /// Registering the same callback again is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `signum` is outside `1..NSIG`, and
    /// [`Error::AlreadyRegistered`] if a different callback holds the slot.
    pub fn register(&self, signum: i32, handler: Option<UserHandler>) -> Result<()> {
        let slot = self.slot(signum).ok_or_else(|| {
            sigsafe_api::error::invalid_argument(&format!("signal {} out of range", signum))
        })?;
        let encoded = handler.map_or(NO_CALLBACK, |h| h as usize);

        match slot.compare_exchange(UNREGISTERED, encoded, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                sys_trace!("registered callback for signal {}", signum);
                Ok(())
            }
            Err(current) if current == encoded => Ok(()),
            Err(_) => Err(Error::AlreadyRegistered(signum)),
        }
    }

    /// Releases a slot claimed with `handler`, so a failed installation can
    /// be retried. A slot holding anything else is left alone.
    pub fn unregister(&self, signum: i32, handler: Option<UserHandler>) {
        let encoded = handler.map_or(NO_CALLBACK, |h| h as usize);
        if let Some(slot) = self.slot(signum) {
            let _ = slot.compare_exchange(encoded, UNREGISTERED, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    /// Whether anything was registered for `signum`
    pub fn is_registered(&self, signum: i32) -> bool {
        self.slot(signum)
            .is_some_and(|slot| slot.load(Ordering::Acquire) != UNREGISTERED)
    }

    /// The callback for `signum`. Async-signal-safe.
    pub fn handler_for(&self, signum: i32) -> Option<UserHandler> {
        let raw = self.slot(signum)?.load(Ordering::Acquire);
        match raw {
            UNREGISTERED | NO_CALLBACK => None,
            // SAFETY: non-sentinel values were stored from a `UserHandler`.
            _ => Some(unsafe { core::mem::transmute::<usize, UserHandler>(raw) }),
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global dispatch table
static DISPATCH: DispatchTable = DispatchTable::new();

/// The table the signal handler consults
pub fn dispatch_table() -> &'static DispatchTable {
    &DISPATCH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(_: i32, _: &InterruptInfo<'_>, _: &mut InterruptContext, _: usize) {}
    fn second(_: i32, _: &InterruptInfo<'_>, _: &mut InterruptContext, _: usize) {}

    #[test]
    fn test_range_check() {
        let table = DispatchTable::new();
        assert!(matches!(table.register(0, None), Err(Error::InvalidArgument(_))));
        assert!(matches!(table.register(NSIG as i32, None), Err(Error::InvalidArgument(_))));
        assert!(matches!(table.register(-3, None), Err(Error::InvalidArgument(_))));
        assert!(table.register(NSIG as i32 - 1, None).is_ok());
    }

    #[test]
    fn test_write_once() {
        let table = DispatchTable::new();
        assert!(table.handler_for(libc::SIGUSR1).is_none());
        table.register(libc::SIGUSR1, Some(first)).unwrap();
        table.register(libc::SIGUSR1, Some(first)).unwrap();
        assert_eq!(
            table.register(libc::SIGUSR1, Some(second)),
            Err(Error::AlreadyRegistered(libc::SIGUSR1))
        );
        assert_eq!(
            table.handler_for(libc::SIGUSR1).map(|h| h as usize),
            Some(first as UserHandler as usize)
        );
    }

    #[test]
    fn test_registered_without_callback() {
        let table = DispatchTable::new();
        table.register(libc::SIGALRM, None).unwrap();
        assert!(table.is_registered(libc::SIGALRM));
        assert!(table.handler_for(libc::SIGALRM).is_none());
        assert_eq!(
            table.register(libc::SIGALRM, Some(first)),
            Err(Error::AlreadyRegistered(libc::SIGALRM))
        );
    }

    #[test]
    fn test_unregister_releases_only_own_claim() {
        let table = DispatchTable::new();
        table.register(libc::SIGHUP, Some(first)).unwrap();
        table.unregister(libc::SIGHUP, Some(second));
        assert!(table.is_registered(libc::SIGHUP));

        table.unregister(libc::SIGHUP, Some(first));
        assert!(!table.is_registered(libc::SIGHUP));
        table.register(libc::SIGHUP, Some(second)).unwrap();
    }
}
