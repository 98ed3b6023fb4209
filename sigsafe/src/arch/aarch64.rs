//! aarch64 trampolines
//!
//! The flag arrives in `x0` and is parked in `x9`; `x1..x6` shift down to
//! `x0..x5`. On restart the kernel rewinds `pc` by four bytes onto the
//! `svc` instruction.
//!
//! The generic kernel ABI has no `select`, `poll`, `epoll_wait` or `pause`.
//! Their trampolines trap into `pselect6`, `ppoll` and `epoll_pwait`; the
//! wrappers in this crate translate arguments accordingly.

use core::arch::global_asm;
use core::sync::atomic::AtomicUsize;

use sigsafe_api::{RawRegion, INTERRUPTED};

use super::Trampoline;
use crate::types::SyscallId;

macro_rules! trampolines {
    ($($id:ident => $entry:ident, $region:ident, $nr:expr;)*) => {
        $(
            global_asm!(
                concat!(".pushsection .text.", stringify!($entry), ",\"ax\",%progbits"),
                concat!(".globl ", stringify!($entry)),
                concat!(".hidden ", stringify!($entry)),
                concat!(".type ", stringify!($entry), ",%function"),
                ".p2align 2",
                concat!(stringify!($entry), ":"),
                "    mov x9, x0",
                "    mov x0, x1",
                "    mov x1, x2",
                "    mov x2, x3",
                "    mov x3, x4",
                "    mov x4, x5",
                "    mov x5, x6",
                "    mov x8, #{nr}",
                concat!(".L", stringify!($entry), "_start:"),
                "    ldr x10, [x9]",
                concat!("    cbnz x10, .L", stringify!($entry), "_landing"),
                concat!(".L", stringify!($entry), "_end:"),
                "    svc #0",
                "    ret",
                concat!(".L", stringify!($entry), "_landing:"),
                "    mov x0, #{interrupted}",
                "    ret",
                concat!(".size ", stringify!($entry), ", . - ", stringify!($entry)),
                ".popsection",
                concat!(".pushsection .data.rel.ro.", stringify!($region), ",\"aw\",%progbits"),
                concat!(".globl ", stringify!($region)),
                concat!(".hidden ", stringify!($region)),
                concat!(".type ", stringify!($region), ",%object"),
                ".p2align 3",
                concat!(stringify!($region), ":"),
                concat!("    .quad .L", stringify!($entry), "_start"),
                concat!("    .quad .L", stringify!($entry), "_end"),
                concat!("    .quad .L", stringify!($entry), "_landing"),
                concat!(".size ", stringify!($region), ", 24"),
                ".popsection",
                nr = const $nr,
                interrupted = const INTERRUPTED,
            );
        )*

        #[allow(non_upper_case_globals)]
        unsafe extern "C" {
            $(
                fn $entry(
                    flag: *const AtomicUsize,
                    a1: usize,
                    a2: usize,
                    a3: usize,
                    a4: usize,
                    a5: usize,
                    a6: usize,
                ) -> isize;
                static $region: RawRegion;
            )*
        }

        /// Trampolines indexed by [`SyscallId`] discriminant
        pub(crate) static TRAMPOLINES: [Trampoline; SyscallId::COUNT] = [
            $(Trampoline::new(SyscallId::$id, $entry, || unsafe { $region }),)*
        ];
    };
}

trampolines! {
    Read => sigsafe_read, sigsafe_read_region, libc::SYS_read;
    Readv => sigsafe_readv, sigsafe_readv_region, libc::SYS_readv;
    Write => sigsafe_write, sigsafe_write_region, libc::SYS_write;
    Writev => sigsafe_writev, sigsafe_writev_region, libc::SYS_writev;
    Accept => sigsafe_accept, sigsafe_accept_region, libc::SYS_accept;
    Connect => sigsafe_connect, sigsafe_connect_region, libc::SYS_connect;
    Recvfrom => sigsafe_recvfrom, sigsafe_recvfrom_region, libc::SYS_recvfrom;
    Sendto => sigsafe_sendto, sigsafe_sendto_region, libc::SYS_sendto;
    Recvmsg => sigsafe_recvmsg, sigsafe_recvmsg_region, libc::SYS_recvmsg;
    Sendmsg => sigsafe_sendmsg, sigsafe_sendmsg_region, libc::SYS_sendmsg;
    Select => sigsafe_select, sigsafe_select_region, libc::SYS_pselect6;
    Poll => sigsafe_poll, sigsafe_poll_region, libc::SYS_ppoll;
    EpollWait => sigsafe_epoll_wait, sigsafe_epoll_wait_region, libc::SYS_epoll_pwait;
    Wait4 => sigsafe_wait4, sigsafe_wait4_region, libc::SYS_wait4;
    Nanosleep => sigsafe_nanosleep, sigsafe_nanosleep_region, libc::SYS_nanosleep;
    Pause => sigsafe_pause, sigsafe_pause_region, libc::SYS_ppoll;
}

/// Reads the interrupted program counter from a signal context.
///
/// # Safety
///
/// `context` must be the `ucontext_t` handed to an `SA_SIGINFO` handler.
pub(crate) unsafe fn context_pc(context: *const libc::ucontext_t) -> usize {
    unsafe { (*context).uc_mcontext.pc as usize }
}

/// Rewrites the program counter the thread resumes at.
///
/// # Safety
///
/// Same as [`context_pc`]; `pc` must be a valid resume address.
pub(crate) unsafe fn set_context_pc(context: *mut libc::ucontext_t, pc: usize) {
    unsafe { (*context).uc_mcontext.pc = pc as _ };
}
