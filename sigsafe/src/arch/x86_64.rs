//! x86_64 trampolines
//!
//! Argument shuffle: the flag arrives in `rdi` and is parked in `r11`; the
//! six call arguments move from `rsi, rdx, rcx, r8, r9, [rsp + 8]` to the
//! kernel's `rdi, rsi, rdx, r10, r8, r9`. On restart the kernel rewinds
//! `rip` by two bytes onto the `syscall` instruction, which is the end of
//! the guarded region.

use core::arch::global_asm;
use core::sync::atomic::AtomicUsize;

use sigsafe_api::{RawRegion, INTERRUPTED};

use super::Trampoline;
use crate::types::SyscallId;

macro_rules! trampolines {
    ($($id:ident => $entry:ident, $region:ident, $nr:expr;)*) => {
        $(
            global_asm!(
                concat!(".pushsection .text.", stringify!($entry), ",\"ax\",@progbits"),
                concat!(".globl ", stringify!($entry)),
                concat!(".hidden ", stringify!($entry)),
                concat!(".type ", stringify!($entry), ",@function"),
                ".p2align 4",
                concat!(stringify!($entry), ":"),
                "    mov r11, rdi",
                "    mov rdi, rsi",
                "    mov rsi, rdx",
                "    mov rdx, rcx",
                "    mov r10, r8",
                "    mov r8, r9",
                "    mov r9, qword ptr [rsp + 8]",
                "    mov eax, {nr}",
                concat!(".L", stringify!($entry), "_start:"),
                "    cmp qword ptr [r11], 0",
                concat!("    jne .L", stringify!($entry), "_landing"),
                concat!(".L", stringify!($entry), "_end:"),
                "    syscall",
                "    ret",
                concat!(".L", stringify!($entry), "_landing:"),
                "    mov rax, {interrupted}",
                "    ret",
                concat!(".size ", stringify!($entry), ", . - ", stringify!($entry)),
                ".popsection",
                concat!(".pushsection .data.rel.ro.", stringify!($region), ",\"aw\",@progbits"),
                concat!(".globl ", stringify!($region)),
                concat!(".hidden ", stringify!($region)),
                concat!(".type ", stringify!($region), ",@object"),
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
    Select => sigsafe_select, sigsafe_select_region, libc::SYS_select;
    Poll => sigsafe_poll, sigsafe_poll_region, libc::SYS_poll;
    EpollWait => sigsafe_epoll_wait, sigsafe_epoll_wait_region, libc::SYS_epoll_wait;
    Wait4 => sigsafe_wait4, sigsafe_wait4_region, libc::SYS_wait4;
    Nanosleep => sigsafe_nanosleep, sigsafe_nanosleep_region, libc::SYS_nanosleep;
    Pause => sigsafe_pause, sigsafe_pause_region, libc::SYS_pause;
}

/// Reads the interrupted program counter from a signal context.
///
/// # Safety
///
/// `context` must be the `ucontext_t` handed to an `SA_SIGINFO` handler.
pub(crate) unsafe fn context_pc(context: *const libc::ucontext_t) -> usize {
    unsafe { (*context).uc_mcontext.gregs[libc::REG_RIP as usize] as usize }
}

/// Rewrites the program counter the thread resumes at.
///
/// # Safety
///
/// Same as [`context_pc`]; `pc` must be a valid resume address.
pub(crate) unsafe fn set_context_pc(context: *mut libc::ucontext_t, pc: usize) {
    unsafe { (*context).uc_mcontext.gregs[libc::REG_RIP as usize] = pc as libc::greg_t };
}
