//! Common types for guarded system calls

use core::fmt;

/// Number of signal numbers the dispatch table can hold (`_NSIG` on Linux).
///
/// Valid signal numbers are `1..NSIG`.
pub const NSIG: usize = 65;

/// Identifies one guarded system call.
///
/// The discriminant indexes the platform trampoline table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum SyscallId {
    Read = 0,
    Readv,
    Write,
    Writev,
    Accept,
    Connect,
    Recvfrom,
    Sendto,
    Recvmsg,
    Sendmsg,
    Select,
    Poll,
    EpollWait,
    Wait4,
    Nanosleep,
    Pause,
}

impl SyscallId {
    /// Number of guarded system calls
    pub const COUNT: usize = 16;

    /// Every guarded system call, in discriminant order
    pub const ALL: [SyscallId; Self::COUNT] = [
        SyscallId::Read,
        SyscallId::Readv,
        SyscallId::Write,
        SyscallId::Writev,
        SyscallId::Accept,
        SyscallId::Connect,
        SyscallId::Recvfrom,
        SyscallId::Sendto,
        SyscallId::Recvmsg,
        SyscallId::Sendmsg,
        SyscallId::Select,
        SyscallId::Poll,
        SyscallId::EpollWait,
        SyscallId::Wait4,
        SyscallId::Nanosleep,
        SyscallId::Pause,
    ];

    /// The name of the wrapped call
    pub fn name(self) -> &'static str {
        match self {
            SyscallId::Read => "read",
            SyscallId::Readv => "readv",
            SyscallId::Write => "write",
            SyscallId::Writev => "writev",
            SyscallId::Accept => "accept",
            SyscallId::Connect => "connect",
            SyscallId::Recvfrom => "recvfrom",
            SyscallId::Sendto => "sendto",
            SyscallId::Recvmsg => "recvmsg",
            SyscallId::Sendmsg => "sendmsg",
            SyscallId::Select => "select",
            SyscallId::Poll => "poll",
            SyscallId::EpollWait => "epoll_wait",
            SyscallId::Wait4 => "wait4",
            SyscallId::Nanosleep => "nanosleep",
            SyscallId::Pause => "pause",
        }
    }
}

impl fmt::Display for SyscallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_in_discriminant_order() {
        for (index, id) in SyscallId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, index);
        }
    }

    #[test]
    fn test_names_unique() {
        for a in SyscallId::ALL {
            for b in SyscallId::ALL {
                if a != b {
                    assert_ne!(a.name(), b.name());
                }
            }
        }
    }
}
