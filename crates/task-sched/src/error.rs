//! Central error type other subsystem crates convert into at the syscall
//! boundary (§2.2/§7), generalized from `kernel/src/fs/error.rs`'s typed-enum
//! + `Display` pattern.
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No such process / task.
    NoSuchTask,
    /// Operation not permitted.
    NotPermitted,
    /// Invalid argument.
    InvalidArgument,
    /// Resource temporarily unavailable (non-blocking call would block).
    WouldBlock,
    /// Interrupted by a signal.
    Interrupted,
    /// Timed out.
    TimedOut,
    /// A table (task table, timer table, waiter pool, fd table, ...) is full.
    ResourceExhausted,
    /// Device/medium I/O failure, propagated unchanged from the driver.
    IoError,
    /// Bad address / fault in user memory.
    Fault,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::NoSuchTask => "no such task",
            KernelError::NotPermitted => "operation not permitted",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::WouldBlock => "resource temporarily unavailable",
            KernelError::Interrupted => "interrupted system call",
            KernelError::TimedOut => "timed out",
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::IoError => "I/O error",
            KernelError::Fault => "bad address",
        };
        f.write_str(s)
    }
}

/// `-errno` convention used at the syscall return boundary.
impl From<KernelError> for i32 {
    fn from(e: KernelError) -> i32 {
        match e {
            KernelError::NoSuchTask => -3,       // ESRCH
            KernelError::NotPermitted => -1,     // EPERM
            KernelError::InvalidArgument => -22, // EINVAL
            KernelError::WouldBlock => -11,      // EAGAIN/EWOULDBLOCK
            KernelError::Interrupted => -4,      // EINTR
            KernelError::TimedOut => -110,       // ETIMEDOUT
            KernelError::ResourceExhausted => -12, // ENOMEM
            KernelError::IoError => -5,          // EIO
            KernelError::Fault => -14,           // EFAULT
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
