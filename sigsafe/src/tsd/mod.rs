//! Per-thread state
//!
//! Each thread that wants guarded calls to observe signals installs its own
//! state: a sticky "received" flag, an opaque user value handed to the
//! signal callback, and an optional destructor run at thread exit.
//!
//! The state is reachable through a raw pointer held in a const-initialized
//! thread-local without drop glue, so the signal handler can read it at any
//! point in the thread's life. Ownership lives in a second thread-local whose
//! destructor clears the pointer before it runs the user destructor and
//! frees the allocation.

use core::cell::{Cell, RefCell};
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use sigsafe_api::{Error, Result};

/// Flag handed to trampolines on threads without installed state.
///
/// Nothing ever sets it, so guarded calls on such threads always reach the
/// kernel.
static NEVER_RECEIVED: AtomicUsize = AtomicUsize::new(0);

/// Destructor invoked with the user value when the owning thread exits
pub type Destructor = fn(usize);

/// State installed by one thread
#[derive(Debug)]
pub struct ThreadState {
    received: AtomicUsize,
    user_data: usize,
    destructor: Option<Destructor>,
}

impl ThreadState {
    fn new(user_data: usize, destructor: Option<Destructor>) -> Self {
        Self {
            received: AtomicUsize::new(0),
            user_data,
            destructor,
        }
    }

    /// Marks a signal as received. Async-signal-safe.
    pub(crate) fn mark_received(&self) {
        self.received.store(1, Ordering::Release);
    }

    pub(crate) fn received(&self) -> bool {
        self.received.load(Ordering::Acquire) != 0
    }

    pub(crate) fn user_data(&self) -> usize {
        self.user_data
    }

    pub(crate) fn flag(&self) -> &AtomicUsize {
        &self.received
    }
}

struct StateOwner(Box<ThreadState>);

impl Drop for StateOwner {
    fn drop(&mut self) {
        // Signals arriving from here on behave as on a thread without state
        let _ = CURRENT.try_with(|current| current.set(ptr::null()));
        core::sync::atomic::compiler_fence(Ordering::SeqCst);
        if let Some(destructor) = self.0.destructor {
            destructor(self.0.user_data);
        }
    }
}

thread_local! {
    static CURRENT: Cell<*const ThreadState> = const { Cell::new(ptr::null()) };
    static OWNER: RefCell<Option<StateOwner>> = const { RefCell::new(None) };
}

/// The calling thread's state, if installed.
///
/// # Safety
///
/// The returned reference must not outlive the calling thread's state; do not
/// hold it across thread-local destruction.
pub(crate) unsafe fn current<'a>() -> Option<&'a ThreadState> {
    let raw = CURRENT.try_with(Cell::get).unwrap_or(ptr::null());
    unsafe { raw.as_ref() }
}

/// Address of the flag trampolines check for the calling thread.
///
/// Custom trampolines registered through
/// [`RegistryBuilder`](crate::RegistryBuilder) take this as their flag. On
/// threads without state it is a flag that is never set.
pub fn received_flag() -> *const AtomicUsize {
    // SAFETY: the pointer is used for the duration of one guarded call.
    match unsafe { current() } {
        Some(state) => state.flag(),
        None => &NEVER_RECEIVED,
    }
}

/// Installs per-thread state for the calling thread.
///
/// `user_data` is passed to the signal callback; `destructor`, if any, is
/// called with `user_data` when the thread exits.
///
/// # Errors
///
/// [`Error::AlreadyInstalled`] if this thread already has state.
pub fn install_tsd(user_data: usize, destructor: Option<Destructor>) -> Result<()> {
    if is_installed() {
        return Err(Error::AlreadyInstalled);
    }

    let state = Box::new(ThreadState::new(user_data, destructor));
    let raw: *const ThreadState = &*state;
    OWNER
        .try_with(|owner| *owner.borrow_mut() = Some(StateOwner(state)))
        .map_err(|_| sigsafe_api::error::invalid_argument("thread is exiting"))?;
    CURRENT.with(|current| current.set(raw));

    sys_debug!("installed per-thread state (user data {:#x})", user_data);
    Ok(())
}

/// Whether the calling thread has installed state
pub fn is_installed() -> bool {
    // SAFETY: the reference is dropped immediately.
    unsafe { current() }.is_some()
}

/// Whether a signal has arrived since the last [`clear_received`].
///
/// Returns `false` on threads without installed state.
pub fn is_received() -> bool {
    // SAFETY: the reference is dropped immediately.
    unsafe { current() }.is_some_and(ThreadState::received)
}

/// Atomically clears the received flag and returns the user value.
///
/// Multiple signals arriving before the clear are coalesced: one clear
/// acknowledges all of them.
///
/// # Errors
///
/// [`Error::NotInstalled`] if the calling thread has no state.
pub fn clear_received() -> Result<usize> {
    // SAFETY: the reference is dropped before returning.
    let state = unsafe { current() }.ok_or(Error::NotInstalled)?;
    let was = state.received.swap(0, Ordering::AcqRel);
    if was != 0 {
        sys_trace!("cleared received flag");
    }
    Ok(state.user_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::thread;

    #[test]
    fn test_install_twice() {
        thread::spawn(|| {
            assert_eq!(install_tsd(1, None), Ok(()));
            assert_eq!(install_tsd(2, None), Err(Error::AlreadyInstalled));
            assert_eq!(clear_received(), Ok(1));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_clear_without_state() {
        thread::spawn(|| {
            assert!(!is_installed());
            assert_eq!(clear_received(), Err(Error::NotInstalled));
            assert!(!is_received());
            assert_eq!(received_flag(), &NEVER_RECEIVED as *const AtomicUsize);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_mark_and_clear() {
        thread::spawn(|| {
            install_tsd(7, None).unwrap();
            let state = unsafe { current() }.unwrap();
            state.mark_received();
            state.mark_received();
            assert!(is_received());
            assert_eq!(clear_received(), Ok(7));
            assert!(!is_received());
        })
        .join()
        .unwrap();
    }

    static DESTROYED: AtomicI32 = AtomicI32::new(0);

    fn record_destroyed(user_data: usize) {
        DESTROYED.store(user_data as i32, Ordering::SeqCst);
    }

    #[test]
    fn test_destructor_runs_at_exit() {
        thread::spawn(|| {
            install_tsd(42, Some(record_destroyed)).unwrap();
            assert_eq!(DESTROYED.load(Ordering::SeqCst), 0);
        })
        .join()
        .unwrap();
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 42);
    }
}
