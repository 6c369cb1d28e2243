//! Per-CPU scheduler state (§5). This workspace does not bring up real
//! secondary APs (the Non-goals exclude SMP cache-coherence beyond
//! sequentially-consistent atomics, and AP bring-up is an interrupt-
//! controller concern out of scope), but the data structures are shaped for
//! more than one core so the "unclaimed by another core" rule in §4.2.1 can
//! be exercised in tests with several `CpuId`s.
use crate::task::TaskId;

/// Fixed upper bound on the number of cores this workspace models.
pub const MAX_CPUS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpuId(pub u32);

impl CpuId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Per-CPU scheduler-visible state: the task currently running there, and
/// whether the scheduler lock is held (recursive re-entry is disallowed per
/// §4.2 step 1).
#[derive(Clone, Copy)]
pub struct CpuLocal {
    pub current: Option<TaskId>,
    pub lock_held: bool,
}

impl CpuLocal {
    pub const fn empty() -> Self {
        CpuLocal { current: None, lock_held: false }
    }
}

/// Fixed array of per-CPU blocks, indexed by `CpuId`.
pub struct CpuTable {
    cpus: [CpuLocal; MAX_CPUS],
}

impl CpuTable {
    pub const fn new() -> Self {
        CpuTable { cpus: [CpuLocal::empty(); MAX_CPUS] }
    }

    pub fn get(&self, cpu: CpuId) -> &CpuLocal {
        &self.cpus[cpu.as_usize()]
    }

    pub fn get_mut(&mut self, cpu: CpuId) -> &mut CpuLocal {
        &mut self.cpus[cpu.as_usize()]
    }
}

impl Default for CpuTable {
    fn default() -> Self {
        Self::new()
    }
}
