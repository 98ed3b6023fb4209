//! Signal handler installation and the handler entry point
//!
//! The handler runs on whichever thread the kernel picks. On threads without
//! installed state it does nothing. Otherwise it sets the thread's received
//! flag, runs the user callback registered for the signal, and finally
//! redirects the thread to a landing address if it was interrupted inside a
//! guarded region. `errno` is preserved across the handler.

mod context;

use core::ffi::c_void;
use core::{mem, ptr};

use sigsafe_api::error::{invalid_argument, last_os_error};
use sigsafe_api::{Error, Result};

use crate::core::dispatcher::{dispatch_table, UserHandler};
use crate::core::registry;
use crate::tsd;

pub use self::context::{InterruptContext, InterruptInfo};

type SigactionFn = extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut c_void);

/// Installs the sigsafe handler for `signum` with an optional callback.
///
/// The handler is installed with `SA_SIGINFO | SA_RESTART`: a signal that
/// arrives while a guarded call sleeps in the kernel restarts the call, and
/// the restart lands on the trap instruction inside the guarded region,
/// where the handler redirects it. The platform registry is published first
/// if no registry was installed yet.
///
/// Installing the same callback twice is a no-op. The process-wide
/// disposition applies to every thread; only threads with installed state
/// observe the signal.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for signal numbers outside `1..NSIG`,
///   `SIGKILL`, `SIGSTOP`, or numbers `sigaction` rejects
/// - [`Error::AlreadyRegistered`] if a different callback was installed
/// - [`Error::Os`] for any other `sigaction` failure
pub fn install_handler(signum: i32, handler: Option<UserHandler>) -> Result<()> {
    if signum == libc::SIGKILL || signum == libc::SIGSTOP {
        return Err(invalid_argument(&format!("signal {} cannot be caught", signum)));
    }

    registry::init()?;
    let table = dispatch_table();
    let claimed = !table.is_registered(signum);
    table.register(signum, handler)?;

    // SAFETY: an all-zero sigaction is a valid starting value.
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = on_signal as SigactionFn as libc::sighandler_t;
    action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
    // SAFETY: `action.sa_mask` is a valid sigset_t to initialize.
    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    // SAFETY: `action` is fully initialized and the handler is async-signal-safe.
    if unsafe { libc::sigaction(signum, &action, ptr::null_mut()) } != 0 {
        let err = last_os_error();
        sys_warn!("sigaction({}) failed: {}", signum, err);
        if claimed {
            table.unregister(signum, handler);
        }
        return Err(match err {
            Error::Os(libc::EINVAL) => invalid_argument(&format!("signal {}", signum)),
            other => other,
        });
    }

    sys_debug!("installed handler for signal {}", signum);
    Ok(())
}

extern "C" fn on_signal(signum: libc::c_int, info: *mut libc::siginfo_t, context: *mut c_void) {
    // SAFETY: reads the calling thread's errno slot.
    let saved_errno = unsafe { *libc::__errno_location() };

    // SAFETY: the state outlives this handler invocation; its destructor
    // clears the pointer before freeing it.
    let Some(state) = (unsafe { tsd::current() }) else {
        return;
    };
    state.mark_received();

    // SAFETY: `context` is the ucontext_t the kernel handed to this handler.
    let mut ctx = unsafe { InterruptContext::from_raw(context.cast()) };

    if let Some(callback) = dispatch_table().handler_for(signum) {
        if !info.is_null() {
            // SAFETY: non-null siginfo from the kernel.
            let info = unsafe { InterruptInfo::from_raw(info) };
            callback(signum, &info, &mut ctx, state.user_data());
        }
    }

    if let Some(landing) = registry::registry().and_then(|r| r.redirect(ctx.pc())) {
        // SAFETY: landing addresses come from trampoline descriptors.
        unsafe { ctx.set_pc(landing) };
        #[cfg(feature = "debug_jump")]
        debug_jump();
    }

    // SAFETY: restores the value read on entry.
    unsafe { *libc::__errno_location() = saved_errno };
}

#[cfg(feature = "debug_jump")]
fn debug_jump() {
    const MARK: &[u8] = b"[J]";
    // SAFETY: write(2) is async-signal-safe; the buffer is static.
    unsafe { libc::write(libc::STDERR_FILENO, MARK.as_ptr().cast(), MARK.len()) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_uncatchable() {
        assert!(matches!(install_handler(libc::SIGKILL, None), Err(Error::InvalidArgument(_))));
        assert!(matches!(install_handler(libc::SIGSTOP, None), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(install_handler(0, None), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            install_handler(crate::types::NSIG as i32, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    fn first(_: i32, _: &InterruptInfo<'_>, _: &mut InterruptContext, _: usize) {}
    fn second(_: i32, _: &InterruptInfo<'_>, _: &mut InterruptContext, _: usize) {}

    #[test]
    fn test_failed_sigaction_leaves_slot_free() {
        // Reserved by the C library for its own threads
        let reserved = 32;
        assert!(matches!(install_handler(reserved, Some(first)), Err(Error::InvalidArgument(_))));
        assert!(!dispatch_table().is_registered(reserved));
        assert!(matches!(install_handler(reserved, Some(second)), Err(Error::InvalidArgument(_))));
        assert!(!dispatch_table().is_registered(reserved));
    }

    #[test]
    fn test_handler_ignores_threads_without_state() {
        install_handler(libc::SIGURG, None).unwrap();
        std::thread::spawn(|| {
            // SAFETY: raise is safe to call; the handler is installed.
            unsafe { libc::raise(libc::SIGURG) };
            assert!(!tsd::is_received());
        })
        .join()
        .unwrap();
    }
}
