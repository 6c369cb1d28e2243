//! Task table, multi-core scheduler, and signal delivery (§3, §4.2,
//! §4.2.1-4.2.3), generalized from the teacher's `kernel/src/scheduler/`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod lifecycle;
pub mod percpu;
pub mod sched;
pub mod signal;
pub mod task;

pub use error::{KernelError, KernelResult};
pub use lifecycle::{encode_exit_status, exit_task, fork, setpgid, try_reap_child, wait_channel_for};
pub use percpu::{CpuId, CpuTable, MAX_CPUS};
pub use sched::{Scheduler, DEFAULT_TIMESLICE, FIFO_BASE, NUM_BUCKETS, OTHER_BUCKET, RR_BASE};
pub use task::{Credentials, SchedPolicy, Task, TaskId, TaskState, TaskTable, ThreadGroup};
