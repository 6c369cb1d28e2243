//! Multi-level ready queues and the scheduler invocation path (§4.2,
//! §4.2.1-4.2.3), generalized from the teacher's single flat
//! `VecDeque<Process>` (`kernel/src/scheduler/mod.rs`) into the
//! priority-bucket array the distilled spec requires.
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::percpu::{CpuId, CpuTable, MAX_CPUS};
use crate::signal::has_deliverable_signal;
use crate::task::{SchedPolicy, Task, TaskId, TaskState, TaskTable};

/// Bucket 0 is SCHED_OTHER.
pub const OTHER_BUCKET: usize = 0;
pub const RR_BASE: usize = 1;
pub const RR_LEVELS: usize = 32;
pub const FIFO_BASE: usize = RR_BASE + RR_LEVELS;
pub const FIFO_LEVELS: usize = 32;
pub const NUM_BUCKETS: usize = FIFO_BASE + FIFO_LEVELS;

/// Default SCHED_RR/SCHED_OTHER timeslice, in ticks.
pub const DEFAULT_TIMESLICE: i32 = 10;

fn bucket_for(policy: SchedPolicy, priority: u8) -> usize {
    match policy {
        SchedPolicy::Other | SchedPolicy::Idle => OTHER_BUCKET,
        SchedPolicy::Rr => RR_BASE + (priority as usize).min(RR_LEVELS - 1),
        SchedPolicy::Fifo => FIFO_BASE + (priority as usize).min(FIFO_LEVELS - 1),
    }
}

/// The global scheduler state: priority-bucketed ready queues, the blocked
/// list, and the per-CPU current-task table.
pub struct Scheduler {
    pub tasks: TaskTable,
    ready: [VecDeque<TaskId>; NUM_BUCKETS],
    blocked: Vec<TaskId>,
    pub cpus: CpuTable,
    idle_task: Option<TaskId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            tasks: TaskTable::new(),
            ready: core::array::from_fn(|_| VecDeque::new()),
            blocked: Vec::new(),
            cpus: CpuTable::new(),
            idle_task: None,
        }
    }

    pub fn set_idle_task(&mut self, id: TaskId) {
        self.idle_task = Some(id);
    }

    fn bucket_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.get(id).map(|t| bucket_for(t.policy, t.priority))
    }

    /// Enqueue a READY task at the tail of its policy bucket.
    pub fn enqueue_tail(&mut self, id: TaskId) {
        if let Some(b) = self.bucket_of(id) {
            self.ready[b].push_back(id);
        }
    }

    /// Enqueue a READY task at the head of its policy bucket (preempted
    /// SCHED_FIFO, or a priority-lowering requeue per §4.2.3).
    pub fn enqueue_head(&mut self, id: TaskId) {
        if let Some(b) = self.bucket_of(id) {
            self.ready[b].push_front(id);
        }
    }

    /// §4.2.1: scan FIFO buckets high→low, then RR high→low, then OTHER.
    /// Returns the first READY task in any bucket whose `cpuid == -1`
    /// (unclaimed by another core), removing it from the bucket.
    fn pop_next_runnable(&mut self) -> Option<TaskId> {
        for bucket in (FIFO_BASE..NUM_BUCKETS).rev().chain((RR_BASE..FIFO_BASE).rev()).chain(core::iter::once(OTHER_BUCKET)) {
            let len = self.ready[bucket].len();
            for _ in 0..len {
                let candidate = self.ready[bucket].pop_front()?;
                let eligible = self
                    .tasks
                    .get(candidate)
                    .map(|t| t.state == TaskState::Ready && t.cpuid == -1)
                    .unwrap_or(false);
                if eligible {
                    return Some(candidate);
                }
                // not eligible right now (claimed by another core, or
                // stale) — keep it in the bucket and keep scanning
                self.ready[bucket].push_back(candidate);
            }
        }
        None
    }

    /// §4.2 steps 2-6: the full scheduler invocation path for `cpu`.
    /// Interrupt-disable and the global lock are the caller's
    /// responsibility (this crate models the pure decision logic; `kernel/`
    /// wraps it with `without_interrupts`/`SCHEDULER.lock()` the way the
    /// teacher already does around `yield_now`).
    pub fn schedule(&mut self, cpu: CpuId) -> Option<TaskId> {
        let outgoing = self.cpus.get(cpu).current;

        if let Some(out_id) = outgoing {
            if let Some(task) = self.tasks.get(out_id) {
                if task.state == TaskState::Running {
                    self.requeue_outgoing(out_id);
                }
            }
        }

        let next = self.pop_next_runnable().or_else(|| {
            // nothing else runnable: keep running the current task if it
            // is still Running/Ready, otherwise fall back to idle
            match outgoing {
                Some(id) if self.is_still_runnable(id) => Some(id),
                _ => self.idle_task,
            }
        })?;

        if Some(next) != outgoing {
            if let Some(out_id) = outgoing {
                if let Some(t) = self.tasks.get_mut(out_id) {
                    t.cpuid = -1;
                }
            }
        }

        if let Some(t) = self.tasks.get_mut(next) {
            debug_assert!(t.cpuid == -1 || t.cpuid == cpu.0 as i32);
            t.cpuid = cpu.0 as i32;
            t.state = TaskState::Running;
        }
        self.cpus.get_mut(cpu).current = Some(next);

        Some(next)
    }

    fn is_still_runnable(&self, id: TaskId) -> bool {
        self.tasks
            .get(id)
            .map(|t| matches!(t.state, TaskState::Running | TaskState::Ready))
            .unwrap_or(false)
    }

    /// §4.2 step 2: demote the outgoing Running task to READY and apply
    /// its policy's requeue rule.
    fn requeue_outgoing(&mut self, id: TaskId) {
        let (policy, timeslice_expired) = {
            let t = self.tasks.get(id).unwrap();
            (t.policy, t.timeslice <= 0)
        };

        if let Some(t) = self.tasks.get_mut(id) {
            t.state = TaskState::Ready;
        }

        match policy {
            SchedPolicy::Fifo => {
                // preempted mid-quantum stays at the head of its bucket
                self.enqueue_head(id);
            }
            SchedPolicy::Rr => {
                if timeslice_expired {
                    if let Some(t) = self.tasks.get_mut(id) {
                        t.timeslice = DEFAULT_TIMESLICE;
                    }
                    self.enqueue_tail(id);
                } else {
                    self.enqueue_head(id);
                }
            }
            SchedPolicy::Other => {
                if let Some(t) = self.tasks.get_mut(id) {
                    t.timeslice = DEFAULT_TIMESLICE;
                }
                self.enqueue_tail(id);
            }
            SchedPolicy::Idle => {
                self.enqueue_tail(id);
            }
        }
    }

    /// §4.2.2 `block_task`: park the calling task on `channel`.
    ///
    /// Returns `Ok(false)` if the task actually blocked, `Ok(true)` if an
    /// already-pending deliverable signal short-circuited the block
    /// (interruptible waits only) — the lost-wakeup-prevention rule.
    pub fn block_task(
        &mut self,
        id: TaskId,
        channel: u64,
        interruptible: bool,
    ) -> KernelResult<bool> {
        let task = self.tasks.get_mut(id).ok_or(KernelError::NoSuchTask)?;

        if interruptible && has_deliverable_signal(task.pending_signals, task.blocked_signals) {
            return Ok(true);
        }

        task.wait_channel = Some(channel);
        task.state = if interruptible {
            TaskState::Sleeping
        } else {
            TaskState::Waiting
        };
        task.cpuid = -1;
        self.blocked.push(id);
        Ok(false)
    }

    /// §4.2.2 `unblock_tasks`: wake every blocked task waiting on
    /// `channel`. Returns the list of tasks that were actually woken, for
    /// the caller to decide preemption.
    pub fn unblock_tasks(&mut self, channel: u64) -> Vec<TaskId> {
        let mut woken = Vec::new();
        self.blocked.retain(|&id| {
            let matches = self
                .tasks
                .get(id)
                .map(|t| t.wait_channel == Some(channel) && t.state != TaskState::Zombie)
                .unwrap_or(false);
            if matches {
                if let Some(t) = self.tasks.get_mut(id) {
                    t.state = TaskState::Ready;
                    t.wait_channel = None;
                }
                self.enqueue_tail(id);
                woken.push(id);
                false
            } else {
                true
            }
        });
        woken
    }

    /// Cancellation path: mark a specific blocked task to wake with
    /// `woke_by_signal` set, then unblock it via its channel.
    pub fn cancel_wait(&mut self, id: TaskId) -> KernelResult<()> {
        let task = self.tasks.get_mut(id).ok_or(KernelError::NoSuchTask)?;
        if task.state != TaskState::Sleeping {
            // uninterruptible waits ignore cancellation
            return Ok(());
        }
        task.woke_by_signal = true;
        let channel = task.wait_channel;
        if let Some(ch) = channel {
            self.unblock_tasks(ch);
        }
        Ok(())
    }

    /// §4.2.3: change a runnable task's priority, requeuing per the
    /// raise-to-tail / lower-to-head rule. No-op for a task that isn't
    /// currently in a ready bucket.
    pub fn change_priority(&mut self, id: TaskId, new_priority: u8) -> KernelResult<()> {
        let (old_priority, policy, state) = {
            let t = self.tasks.get(id).ok_or(KernelError::NoSuchTask)?;
            (t.priority, t.policy, t.state)
        };

        if state != TaskState::Ready {
            if let Some(t) = self.tasks.get_mut(id) {
                t.priority = new_priority;
            }
            return Ok(());
        }

        let old_bucket = bucket_for(policy, old_priority);
        if let Some(pos) = self.ready[old_bucket].iter().position(|&x| x == id) {
            self.ready[old_bucket].remove(pos);
        }

        if let Some(t) = self.tasks.get_mut(id) {
            t.priority = new_priority;
        }

        if new_priority > old_priority {
            self.enqueue_tail(id);
        } else if new_priority < old_priority {
            self.enqueue_head(id);
        } else {
            // equal change: reinsert at the same end it was removed from
            // is indistinguishable here since exact list position isn't
            // tracked beyond bucket membership; tail preserves FIFO order
            // for same-priority siblings.
            self.enqueue_tail(id);
        }

        Ok(())
    }

    pub fn ready_len(&self, bucket: usize) -> usize {
        self.ready[bucket].len()
    }

    pub fn num_cpus(&self) -> usize {
        MAX_CPUS
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Credentials;
    use alloc::string::String;
    use alloc::vec::Vec as StdVec;

    fn spawn(sched: &mut Scheduler, name: &str, policy: SchedPolicy, priority: u8) -> TaskId {
        let id = sched.tasks.insert_with(|id| Task {
            id,
            name: String::from(name),
            tgid: id.index(),
            pgid: 0,
            sid: 0,
            parent: None,
            children: StdVec::new(),
            creds: Credentials::root(),
            policy,
            priority,
            timeslice: DEFAULT_TIMESLICE,
            cpuid: -1,
            state: TaskState::Ready,
            wait_channel: None,
            woke_by_signal: false,
            exit_status: None,
            pending_signals: 0,
            blocked_signals: 0,
            utime_ticks: 0,
            stime_ticks: 0,
        });
        sched.enqueue_tail(id);
        id
    }

    #[test]
    fn fifo_beats_rr_beats_other() {
        let mut sched = Scheduler::new();
        let other = spawn(&mut sched, "other", SchedPolicy::Other, 0);
        let rr = spawn(&mut sched, "rr", SchedPolicy::Rr, 5);
        let fifo = spawn(&mut sched, "fifo", SchedPolicy::Fifo, 1);

        let cpu = CpuId(0);
        let picked = sched.schedule(cpu).unwrap();
        assert_eq!(picked, fifo);

        // fifo task finishes running; demote it out of Running state so
        // the next schedule() call doesn't just keep it current
        if let Some(t) = sched.tasks.get_mut(fifo) {
            t.state = TaskState::Zombie;
        }
        sched.cpus.get_mut(cpu).current = None;

        let picked2 = sched.schedule(cpu).unwrap();
        assert_eq!(picked2, rr);

        if let Some(t) = sched.tasks.get_mut(rr) {
            t.state = TaskState::Zombie;
        }
        sched.cpus.get_mut(cpu).current = None;
        let picked3 = sched.schedule(cpu).unwrap();
        assert_eq!(picked3, other);
    }

    #[test]
    fn unclaimed_by_another_core_rule() {
        let mut sched = Scheduler::new();
        let t1 = spawn(&mut sched, "t1", SchedPolicy::Other, 0);

        // pretend t1 is already running on CPU 1
        if let Some(t) = sched.tasks.get_mut(t1) {
            t.cpuid = 1;
        }
        sched.ready[OTHER_BUCKET].push_back(t1);

        let picked = sched.schedule(CpuId(0));
        // t1 is claimed by CPU 1; nothing else runnable, idle_task unset
        assert!(picked.is_none());
    }

    #[test]
    fn block_then_unblock_round_trips() {
        let mut sched = Scheduler::new();
        let t1 = spawn(&mut sched, "t1", SchedPolicy::Other, 0);
        // pop it out of ready since block_task assumes caller already owns it
        sched.ready[OTHER_BUCKET].clear();

        let blocked_immediately = sched.block_task(t1, 0xdead, true).unwrap();
        assert!(!blocked_immediately);
        assert_eq!(sched.tasks.get(t1).unwrap().state, TaskState::Sleeping);

        let woken = sched.unblock_tasks(0xdead);
        assert_eq!(woken, alloc::vec![t1]);
        assert_eq!(sched.tasks.get(t1).unwrap().state, TaskState::Ready);
    }

    #[test]
    fn block_task_short_circuits_on_pending_signal() {
        use crate::signal::{raise, SIGINT};
        let mut sched = Scheduler::new();
        let t1 = spawn(&mut sched, "t1", SchedPolicy::Other, 0);
        sched.ready[OTHER_BUCKET].clear();
        raise(&mut sched.tasks.get_mut(t1).unwrap().pending_signals, SIGINT);

        let short_circuited = sched.block_task(t1, 1, true).unwrap();
        assert!(short_circuited);
        // state untouched — never actually went to sleep
        assert_eq!(sched.tasks.get(t1).unwrap().state, TaskState::Ready);
    }

    #[test]
    fn raising_priority_requeues_at_tail() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched, "a", SchedPolicy::Rr, 5);
        let b = spawn(&mut sched, "b", SchedPolicy::Rr, 5);
        sched.change_priority(a, 10).unwrap();

        let bucket = RR_BASE + 10;
        assert_eq!(sched.ready[bucket].front().copied(), Some(a));
        assert_eq!(sched.ready[RR_BASE + 5].front().copied(), Some(b));
    }

    #[test]
    fn lowering_priority_requeues_at_head() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched, "a", SchedPolicy::Rr, 10);
        sched.change_priority(a, 2).unwrap();
        let bucket = RR_BASE + 2;
        assert_eq!(sched.ready[bucket].front().copied(), Some(a));
    }
}
