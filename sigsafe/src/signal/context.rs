//! Views of the signal information and interrupted context

use core::fmt;

use crate::arch;

/// Read-only view of the `siginfo_t` a signal was delivered with
pub struct InterruptInfo<'a> {
    raw: &'a libc::siginfo_t,
}

impl<'a> InterruptInfo<'a> {
    /// # Safety
    ///
    /// `raw` must be the `siginfo_t` pointer handed to an `SA_SIGINFO`
    /// handler and must not be null.
    pub(crate) unsafe fn from_raw(raw: *const libc::siginfo_t) -> Self {
        Self { raw: unsafe { &*raw } }
    }

    /// Signal number
    pub fn signo(&self) -> i32 {
        self.raw.si_signo
    }

    /// Signal code (`SI_USER`, `SI_TKILL`, ...)
    pub fn code(&self) -> i32 {
        self.raw.si_code
    }

    /// Sending process, meaningful for signals sent with `kill` and friends
    pub fn pid(&self) -> libc::pid_t {
        // SAFETY: the union field is plain data; callers interpret it by code.
        unsafe { self.raw.si_pid() }
    }

    /// Real user ID of the sending process
    pub fn uid(&self) -> libc::uid_t {
        // SAFETY: as for `pid`.
        unsafe { self.raw.si_uid() }
    }

    /// The raw structure
    pub fn as_raw(&self) -> &libc::siginfo_t {
        self.raw
    }
}

impl fmt::Debug for InterruptInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptInfo")
            .field("signo", &self.signo())
            .field("code", &self.code())
            .finish()
    }
}

/// Mutable view of the interrupted thread's machine context
pub struct InterruptContext {
    raw: *mut libc::ucontext_t,
}

impl InterruptContext {
    /// # Safety
    ///
    /// `raw` must be the context pointer handed to an `SA_SIGINFO` handler,
    /// used only while that handler runs.
    pub(crate) unsafe fn from_raw(raw: *mut libc::ucontext_t) -> Self {
        Self { raw }
    }

    /// Program counter the thread will resume at
    pub fn pc(&self) -> usize {
        // SAFETY: `raw` is a live handler context.
        unsafe { arch::context_pc(self.raw) }
    }

    /// Changes the program counter the thread will resume at.
    ///
    /// # Safety
    ///
    /// `pc` must be an address the interrupted code can safely continue at.
    pub unsafe fn set_pc(&mut self, pc: usize) {
        unsafe { arch::set_context_pc(self.raw, pc) }
    }

    /// The raw context
    pub fn as_raw(&mut self) -> *mut libc::ucontext_t {
        self.raw
    }
}

impl fmt::Debug for InterruptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptContext")
            .field("pc", &format_args!("{:#x}", self.pc()))
            .finish()
    }
}
