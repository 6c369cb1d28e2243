//! Delta-queue clock waiters (§4.3) and POSIX per-process timers (§4.4).
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod timer;
pub mod waiter;

pub use timer::{PosixTimer, PosixTimerTable, SigEvent, SigNotify, DELAYTIMER_MAX};
pub use waiter::{ClockId, ClockWaiters, ExpiredEntry, NWAITERS};

/// Tick rate of the global system timer. One tick is the unit every delta
/// queue entry counts down in.
pub const PIT_FREQUENCY: u64 = 1000;
