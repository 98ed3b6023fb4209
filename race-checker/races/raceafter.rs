//! A read trampoline whose guarded span is one instruction too long
//!
//! The span ends on the instruction after the kernel call instead of on the
//! call itself. A signal landing there is reported as an interruption even
//! though the read already consumed its data.

use core::arch::global_asm;
use core::sync::atomic::AtomicUsize;

use sigsafe::{GuardedRegion, RawRegion, INTERRUPTED};

/// Registry name of the span
pub const NAME: &str = "raceafter_read";

#[cfg(target_arch = "x86_64")]
global_asm!(
    ".pushsection .text.race_checker_raceafter_read,\"ax\",@progbits",
    ".globl race_checker_raceafter_read",
    ".hidden race_checker_raceafter_read",
    ".type race_checker_raceafter_read,@function",
    ".p2align 4",
    "race_checker_raceafter_read:",
    "    mov r11, rdi",
    "    mov rdi, rsi",
    "    mov rsi, rdx",
    "    mov rdx, rcx",
    "    mov eax, {nr}",
    ".Lraceafter_start:",
    "    cmp qword ptr [r11], 0",
    "    jne .Lraceafter_landing",
    "    syscall",
    ".Lraceafter_end:",
    "    nop",
    "    ret",
    ".Lraceafter_landing:",
    "    mov rax, {interrupted}",
    "    ret",
    ".size race_checker_raceafter_read, . - race_checker_raceafter_read",
    ".popsection",
    ".pushsection .data.rel.ro.race_checker_raceafter_region,\"aw\",@progbits",
    ".globl race_checker_raceafter_region",
    ".hidden race_checker_raceafter_region",
    ".type race_checker_raceafter_region,@object",
    ".p2align 3",
    "race_checker_raceafter_region:",
    "    .quad .Lraceafter_start",
    "    .quad .Lraceafter_end",
    "    .quad .Lraceafter_landing",
    ".size race_checker_raceafter_region, 24",
    ".popsection",
    nr = const libc::SYS_read,
    interrupted = const INTERRUPTED,
);

#[cfg(target_arch = "aarch64")]
global_asm!(
    ".pushsection .text.race_checker_raceafter_read,\"ax\",%progbits",
    ".globl race_checker_raceafter_read",
    ".hidden race_checker_raceafter_read",
    ".type race_checker_raceafter_read,%function",
    ".p2align 2",
    "race_checker_raceafter_read:",
    "    mov x9, x0",
    "    mov x0, x1",
    "    mov x1, x2",
    "    mov x2, x3",
    "    mov x8, #{nr}",
    ".Lraceafter_start:",
    "    ldr x10, [x9]",
    "    cbnz x10, .Lraceafter_landing",
    "    svc #0",
    ".Lraceafter_end:",
    "    nop",
    "    ret",
    ".Lraceafter_landing:",
    "    mov x0, #{interrupted}",
    "    ret",
    ".size race_checker_raceafter_read, . - race_checker_raceafter_read",
    ".popsection",
    ".pushsection .data.rel.ro.race_checker_raceafter_region,\"aw\",%progbits",
    ".globl race_checker_raceafter_region",
    ".hidden race_checker_raceafter_region",
    ".type race_checker_raceafter_region,%object",
    ".p2align 3",
    "race_checker_raceafter_region:",
    "    .quad .Lraceafter_start",
    "    .quad .Lraceafter_end",
    "    .quad .Lraceafter_landing",
    ".size race_checker_raceafter_region, 24",
    ".popsection",
    nr = const libc::SYS_read,
    interrupted = const INTERRUPTED,
);

unsafe extern "C" {
    fn race_checker_raceafter_read(
        flag: *const AtomicUsize,
        fd: usize,
        buf: usize,
        len: usize,
    ) -> isize;
    static race_checker_raceafter_region: RawRegion;
}

/// The span to add to the registry
pub fn region() -> GuardedRegion {
    // SAFETY: the descriptor is immutable data emitted above.
    GuardedRegion::new(NAME, unsafe { race_checker_raceafter_region })
}

/// Reads into `buf` through the faulty trampoline
pub fn read(fd: i32, buf: &mut [u8]) -> isize {
    // SAFETY: the flag belongs to this thread and `buf` is valid for writes.
    unsafe {
        race_checker_raceafter_read(
            sigsafe::received_flag(),
            fd as usize,
            buf.as_mut_ptr() as usize,
            buf.len(),
        )
    }
}
