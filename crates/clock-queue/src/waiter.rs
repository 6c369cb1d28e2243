//! Two sorted delta queues (realtime, monotonic) of clock waiters, backed by
//! a fixed pool — grounded on `clock.c`'s `waiter_table`/`waiter_malloc`/
//! `waiter_free` and the `clock_wait`/`get_waiter`/`clock_check_waiters`
//! algorithms in the original LaylaOS kernel.
use alloc::vec::Vec;

/// Size of the fixed waiter pool (`NWAITERS` in the original kernel).
pub const NWAITERS: usize = 1024;

/// Index into the waiter pool.
pub type WaiterIdx = u32;

#[derive(Clone, Copy)]
struct Slot {
    used: bool,
    pid: u32,
    /// 0 means this is a `nanosleep` waiter, not a POSIX-timer rearm.
    timerid: u32,
    delta: i64,
    next: Option<WaiterIdx>,
}

impl Slot {
    const fn empty() -> Self {
        Slot { used: false, pid: 0, timerid: 0, delta: 0, next: None }
    }
}

struct Pool {
    slots: [Slot; NWAITERS],
    last_used: usize,
}

impl Pool {
    const fn new() -> Self {
        Pool { slots: [Slot::empty(); NWAITERS], last_used: 0 }
    }

    /// Allocate a free slot, searching forward from the last allocation
    /// point and wrapping once if nothing is found past it (mirrors the
    /// two-pass `waiter_malloc` retry in the original kernel, which favors
    /// spatial locality but still finds freed entries near the start of
    /// the table).
    fn alloc(&mut self) -> Option<WaiterIdx> {
        for i in self.last_used..NWAITERS {
            if !self.slots[i].used {
                self.slots[i].used = true;
                self.last_used = i + 1;
                return Some(i as WaiterIdx);
            }
        }
        for i in 0..self.last_used {
            if !self.slots[i].used {
                self.slots[i].used = true;
                self.last_used = i + 1;
                return Some(i as WaiterIdx);
            }
        }
        None
    }

    fn free(&mut self, idx: WaiterIdx) {
        self.slots[idx as usize] = Slot::empty();
    }
}

/// Which of the two delta queues a waiter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Realtime = 0,
    Monotonic = 1,
}

/// An expired delta-queue entry, as surfaced by [`ClockWaiters::drain_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredEntry {
    pub idx: WaiterIdx,
    pub pid: u32,
    pub timerid: u32,
}

/// Errors returned by the clock-waiter subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    WaiterPoolExhausted,
}

/// The two sorted delta queues (realtime, monotonic) plus the fixed backing
/// pool. Insert/remove/tick/settime-adjust are all O(queue length) walks,
/// same as the original; the point of the delta encoding is that per-tick
/// maintenance only ever touches the head.
pub struct ClockWaiters {
    pool: Pool,
    heads: [Option<WaiterIdx>; 2],
}

impl ClockWaiters {
    pub const fn new() -> Self {
        ClockWaiters { pool: Pool::new(), heads: [None, None] }
    }

    fn head_of(&self, clock: ClockId) -> Option<WaiterIdx> {
        self.heads[clock as usize]
    }

    fn next_after(&self, prev: Option<WaiterIdx>, clock: ClockId) -> Option<WaiterIdx> {
        match prev {
            None => self.head_of(clock),
            Some(p) => self.pool.slots[p as usize].next,
        }
    }

    /// Insert a new waiter with `delta` ticks remaining, splicing it into
    /// the sorted delta queue and fixing up the successor's delta so the
    /// chain invariant (`sum of deltas head..node == absolute remaining`)
    /// holds. Returns the waiter's own stored delta (equal to the input
    /// `delta`, since insertion never changes the absolute target — only
    /// the encoding of everything after it).
    pub fn insert(
        &mut self,
        clock: ClockId,
        pid: u32,
        timerid: u32,
        mut delta: i64,
    ) -> Result<(WaiterIdx, i64), ClockError> {
        let new_idx = self.pool.alloc().ok_or(ClockError::WaiterPoolExhausted)?;

        let mut prev_idx: Option<WaiterIdx> = None;
        loop {
            let next_idx = self.next_after(prev_idx, clock);
            match next_idx {
                Some(ni) => {
                    let next_delta = self.pool.slots[ni as usize].delta;
                    if delta > next_delta {
                        if next_delta > 0 {
                            delta -= next_delta;
                        }
                        prev_idx = Some(ni);
                    } else {
                        break;
                    }
                }
                None => break,
            }
        }

        let next_idx = self.next_after(prev_idx, clock);

        self.pool.slots[new_idx as usize] = Slot {
            used: true,
            pid,
            timerid,
            delta,
            next: next_idx,
        };

        if let Some(ni) = next_idx {
            self.pool.slots[ni as usize].delta -= delta;
        }

        match prev_idx {
            None => self.heads[clock as usize] = Some(new_idx),
            Some(p) => self.pool.slots[p as usize].next = Some(new_idx),
        }

        Ok((new_idx, delta))
    }

    /// Locate the waiter belonging to `(pid, timerid)`, optionally splicing
    /// it out of the list. Returns the waiter's absolute remaining ticks.
    pub fn get_waiter(
        &mut self,
        clock: ClockId,
        pid: u32,
        timerid: u32,
        unlink: bool,
    ) -> Option<(WaiterIdx, i64)> {
        let mut acc: i64 = 0;
        let mut prev_idx: Option<WaiterIdx> = None;

        loop {
            let next_idx = self.next_after(prev_idx, clock)?;
            let (n_pid, n_timerid, n_delta, n_next) = {
                let s = &self.pool.slots[next_idx as usize];
                (s.pid, s.timerid, s.delta, s.next)
            };

            if n_pid == pid && n_timerid == timerid {
                let remaining = n_delta + acc;

                if unlink {
                    if let Some(nn) = n_next {
                        if n_delta > 0 {
                            self.pool.slots[nn as usize].delta += n_delta;
                        }
                    }
                    match prev_idx {
                        None => self.heads[clock as usize] = n_next,
                        Some(p) => self.pool.slots[p as usize].next = n_next,
                    }
                    let w = &mut self.pool.slots[next_idx as usize];
                    w.next = None;
                    w.delta += acc;
                }

                return Some((next_idx, remaining));
            }

            acc += n_delta;
            prev_idx = Some(next_idx);
        }
    }

    /// Release a waiter slot back to the pool (after the caller has already
    /// unlinked it via [`Self::get_waiter`] or [`Self::drain_expired`]).
    pub fn free(&mut self, idx: WaiterIdx) {
        self.pool.free(idx);
    }

    /// Timer-interrupt path: decrement the head of `clock`'s queue by one
    /// tick. Returns `true` if the head has now reached zero or negative
    /// delta and needs expiry processing by the softsleep task.
    pub fn tick(&mut self, clock: ClockId) -> bool {
        match self.head_of(clock) {
            Some(hi) => {
                let w = &mut self.pool.slots[hi as usize];
                w.delta -= 1;
                w.delta <= 0
            }
            None => false,
        }
    }

    /// Softsleep path: remove every waiter at the front of `clock`'s queue
    /// whose delta has reached zero or below.
    ///
    /// Timer-rearm waiters (`timerid != 0`) are unlinked and their pool
    /// slot is freed immediately — the caller is expected to re-insert a
    /// fresh waiter if the timer has a nonzero interval. `nanosleep`
    /// waiters (`timerid == 0`) are left in the list: the sleeping task
    /// removes its own entry via [`Self::get_waiter`] when it wakes, which
    /// avoids a race between softsleep freeing the slot and the task still
    /// reading it.
    pub fn drain_expired(&mut self, clock: ClockId) -> Vec<ExpiredEntry> {
        let mut out = Vec::new();
        let mut prev_idx: Option<WaiterIdx> = None;

        loop {
            let cur = match self.next_after(prev_idx, clock) {
                Some(c) => c,
                None => break,
            };
            let (pid, timerid, delta, next) = {
                let s = &self.pool.slots[cur as usize];
                (s.pid, s.timerid, s.delta, s.next)
            };
            if delta > 0 {
                break;
            }

            out.push(ExpiredEntry { idx: cur, pid, timerid });

            if timerid != 0 {
                match prev_idx {
                    None => self.heads[clock as usize] = next,
                    Some(p) => self.pool.slots[p as usize].next = next,
                }
                self.pool.free(cur);
            } else {
                prev_idx = Some(cur);
            }
        }

        out
    }

    /// CLOCK_REALTIME settime path: the wall clock moved backwards by
    /// `diff` seconds/ticks. Absorb that difference from the front of the
    /// realtime queue so absolute-deadline waiters still fire no later than
    /// their new wall-clock target.
    pub fn settime_adjust(&mut self, clock: ClockId, mut diff: i64) {
        if diff <= 0 {
            return;
        }
        let mut cur = self.head_of(clock);
        while let Some(ci) = cur {
            let delta = self.pool.slots[ci as usize].delta;
            if delta >= diff {
                self.pool.slots[ci as usize].delta -= diff;
                break;
            }
            if delta != 0 {
                diff -= delta;
                self.pool.slots[ci as usize].delta = 0;
            }
            cur = self.pool.slots[ci as usize].next;
        }
    }

    /// Walk the queue front-to-back, yielding each waiter's absolute
    /// remaining ticks. Used by tests to verify the non-decreasing
    /// invariant and by diagnostics.
    pub fn absolute_remainings(&self, clock: ClockId) -> Vec<i64> {
        let mut out = Vec::new();
        let mut acc = 0i64;
        let mut cur = self.head_of(clock);
        while let Some(ci) = cur {
            let s = &self.pool.slots[ci as usize];
            acc += s.delta;
            out.push(acc);
            cur = s.next;
        }
        out
    }
}

impl Default for ClockWaiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_maintains_sorted_delta_queue() {
        let mut w = ClockWaiters::new();
        for (i, ticks) in [5i64, 10, 3, 12, 3].into_iter().enumerate() {
            w.insert(ClockId::Monotonic, i as u32, 0, ticks).unwrap();
        }
        let remainings = w.absolute_remainings(ClockId::Monotonic);
        assert_eq!(remainings, vec![3, 3, 5, 10, 12]);
        // non-decreasing invariant
        for pair in remainings.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn get_waiter_unlink_preserves_chain() {
        let mut w = ClockWaiters::new();
        w.insert(ClockId::Realtime, 1, 0, 5).unwrap();
        w.insert(ClockId::Realtime, 2, 0, 10).unwrap();
        w.insert(ClockId::Realtime, 3, 0, 20).unwrap();

        let before = w.absolute_remainings(ClockId::Realtime);
        assert_eq!(before, vec![5, 10, 20]);

        let (_, remaining) = w.get_waiter(ClockId::Realtime, 2, 0, true).unwrap();
        assert_eq!(remaining, 10);

        let after = w.absolute_remainings(ClockId::Realtime);
        assert_eq!(after, vec![5, 20]);
    }

    #[test]
    fn tick_and_drain_expired_nanosleep_stays_linked_until_self_removed() {
        let mut w = ClockWaiters::new();
        w.insert(ClockId::Monotonic, 42, 0, 1).unwrap();

        assert!(w.tick(ClockId::Monotonic));
        let expired = w.drain_expired(ClockId::Monotonic);
        assert_eq!(expired, vec![ExpiredEntry { idx: 0, pid: 42, timerid: 0 }]);

        // still linked: the sleeping task must remove itself
        assert_eq!(w.absolute_remainings(ClockId::Monotonic), vec![0]);
        let (_, remaining) = w.get_waiter(ClockId::Monotonic, 42, 0, true).unwrap();
        assert_eq!(remaining, 0);
        assert!(w.absolute_remainings(ClockId::Monotonic).is_empty());
    }

    #[test]
    fn drain_expired_timer_waiter_is_unlinked_and_freed() {
        let mut w = ClockWaiters::new();
        w.insert(ClockId::Monotonic, 7, 4, 0).unwrap();
        let expired = w.drain_expired(ClockId::Monotonic);
        assert_eq!(expired, vec![ExpiredEntry { idx: 0, pid: 7, timerid: 4 }]);
        assert!(w.absolute_remainings(ClockId::Monotonic).is_empty());
    }

    #[test]
    fn settime_adjust_absorbs_from_head_forward() {
        let mut w = ClockWaiters::new();
        w.insert(ClockId::Realtime, 1, 0, 5).unwrap();
        w.insert(ClockId::Realtime, 2, 0, 10).unwrap();

        w.settime_adjust(ClockId::Realtime, 8);
        // first waiter (delta 5) fully absorbed (diff becomes 3), second
        // waiter's delta (10) reduced by the remaining 3
        assert_eq!(w.absolute_remainings(ClockId::Realtime), vec![0, 7]);
    }

    #[test]
    fn pool_exhaustion_reports_error() {
        let mut w = ClockWaiters::new();
        for i in 0..NWAITERS {
            w.insert(ClockId::Monotonic, i as u32, 0, 1).unwrap();
        }
        let err = w.insert(ClockId::Monotonic, 9999, 0, 1);
        assert_eq!(err, Err(ClockError::WaiterPoolExhausted));
    }
}
