//! Process lifecycle syscalls (§3's fork/exit/wait, §6's `setpgid`-style
//! credential/session syscalls), generalized from the teacher's
//! `sys_fork`/`sys_wait` (`kernel/src/scheduler/mod.rs`) into operations
//! over the arena-backed `TaskTable` instead of a flat `VecDeque<Process>`.
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::sched::Scheduler;
use crate::task::{Credentials, SchedPolicy, Task, TaskId, TaskState};

/// Encode a task's termination per standard `wait(2)`: low 8 bits = signal
/// number if signaled (0x80 bit set on core dump), otherwise high 8 bits =
/// exit status (§6 "Exit codes from terminated tasks").
pub fn encode_exit_status(exit_code: u8, signaled_by: Option<(u8, bool)>) -> i32 {
    match signaled_by {
        Some((signo, core_dumped)) => {
            let dump_bit = if core_dumped { 0x80 } else { 0 };
            (signo & 0x7f | dump_bit) as i32
        }
        None => (exit_code as i32) << 8,
    }
}

/// `fork()`: allocate a child task inheriting the parent's credentials,
/// process group/session, and policy, recorded as the parent's child.
/// Memory/page-table duplication is a VMM concern out of scope here — the
/// caller is expected to have already cloned the address space before
/// calling this to register the child in the task table.
pub fn fork(sched: &mut Scheduler, parent: TaskId, child_name: String) -> KernelResult<TaskId> {
    let (tgid, pgid, sid, creds, policy, priority) = {
        let p = sched.tasks.get(parent).ok_or(KernelError::NoSuchTask)?;
        (p.tgid, p.pgid, p.sid, p.creds.clone(), p.policy, p.priority)
    };

    let child_id = sched.tasks.insert_with(|id| Task {
        id,
        name: child_name,
        tgid: id.index(),
        pgid,
        sid,
        parent: Some(parent),
        children: Vec::new(),
        creds,
        policy,
        priority,
        timeslice: crate::sched::DEFAULT_TIMESLICE,
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
    let _ = tgid;

    if let Some(p) = sched.tasks.get_mut(parent) {
        p.children.push(child_id);
    }
    sched.enqueue_tail(child_id);
    Ok(child_id)
}

/// `exit()`: transition a task to ZOMBIE, recording its status, and wake a
/// parent blocked in `wait()`. The task struct itself is retained until
/// `reap` removes it — kernel stack/page table release is the caller's
/// responsibility at that later point (§3 lifecycle: "released only after
/// reap").
pub fn exit_task(sched: &mut Scheduler, id: TaskId, status: i32) -> KernelResult<()> {
    let parent = {
        let t = sched.tasks.get_mut(id).ok_or(KernelError::NoSuchTask)?;
        t.state = TaskState::Zombie;
        t.exit_status = Some(status);
        t.cpuid = -1;
        t.parent
    };

    if let Some(parent_id) = parent {
        // wait() blocks on a channel derived from the parent's own id so
        // exit() can target exactly that parent without scanning the table.
        sched.unblock_tasks(wait_channel_for(parent_id));
    }
    Ok(())
}

/// Wait channel a parent blocks on inside `wait()`/`waitpid()`.
pub fn wait_channel_for(parent: TaskId) -> u64 {
    0x5741_4954_0000_0000 | parent.index() as u64
}

/// Non-blocking half of `wait()`/`waitpid()`: scan `parent`'s children for
/// one matching `target` (or any, if `None`) that has reached ZOMBIE,
/// reap it, and return `(child, status)`. Returns `Ok(None)` if a matching
/// child exists but hasn't exited yet — the caller should then
/// `block_task(parent, wait_channel_for(parent), true)`. Returns
/// `Err(NoSuchTask)` if no child matches `target` at all.
pub fn try_reap_child(
    sched: &mut Scheduler,
    parent: TaskId,
    target: Option<TaskId>,
) -> KernelResult<Option<(TaskId, i32)>> {
    let children = sched
        .tasks
        .get(parent)
        .ok_or(KernelError::NoSuchTask)?
        .children
        .clone();

    let mut any_match = false;
    for &child in &children {
        if let Some(want) = target {
            if want != child {
                continue;
            }
        }
        any_match = true;
        if let Some(t) = sched.tasks.get(child) {
            if t.state == TaskState::Zombie {
                let status = t.exit_status.unwrap_or(0);
                sched.tasks.remove(child);
                if let Some(p) = sched.tasks.get_mut(parent) {
                    p.children.retain(|&c| c != child);
                }
                return Ok(Some((child, status)));
            }
        }
    }

    if !any_match {
        return Err(KernelError::NoSuchTask);
    }
    Ok(None)
}

/// `setpgid()`: per the Open Question resolution, validate the session
/// constraint once against the thread-group leader, then apply the new
/// `pgid` to every thread sharing its `tgid` — rather than the original's
/// per-thread loop, which could return success from an earlier thread
/// while a later thread's session check silently failed.
pub fn setpgid(sched: &mut Scheduler, leader: TaskId, new_pgid: u32) -> KernelResult<()> {
    let (sid, tgid, own_id, is_session_leader) = {
        let t = sched.tasks.get(leader).ok_or(KernelError::NoSuchTask)?;
        (t.sid, t.tgid, t.id.index(), t.sid == t.id.index())
    };

    if is_session_leader {
        return Err(KernelError::NotPermitted);
    }

    // The new pgid must either name a group already in this session, or
    // equal the calling task's own id (forming a brand-new group there).
    let group_exists_in_session = sched.tasks.ids().any(|id| {
        sched
            .tasks
            .get(id)
            .map(|t| t.pgid == new_pgid && t.sid == sid)
            .unwrap_or(false)
    });
    if !group_exists_in_session && new_pgid != own_id {
        return Err(KernelError::InvalidArgument);
    }

    let members: Vec<TaskId> = sched
        .tasks
        .ids()
        .filter(|&id| sched.tasks.get(id).map(|t| t.tgid == tgid).unwrap_or(false))
        .collect();
    for id in members {
        if let Some(t) = sched.tasks.get_mut(id) {
            t.pgid = new_pgid;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_init(sched: &mut Scheduler) -> TaskId {
        sched.tasks.insert_with(|id| Task {
            id,
            name: String::from("init"),
            tgid: id.index(),
            pgid: id.index(),
            sid: id.index(),
            parent: None,
            children: Vec::new(),
            creds: Credentials::root(),
            policy: SchedPolicy::Other,
            priority: 0,
            timeslice: crate::sched::DEFAULT_TIMESLICE,
            cpuid: -1,
            state: TaskState::Ready,
            wait_channel: None,
            woke_by_signal: false,
            exit_status: None,
            pending_signals: 0,
            blocked_signals: 0,
            utime_ticks: 0,
            stime_ticks: 0,
        })
    }

    #[test]
    fn fork_exit_wait_lifecycle() {
        let mut sched = Scheduler::new();
        let parent = spawn_init(&mut sched);
        let child = fork(&mut sched, parent, String::from("child")).unwrap();

        assert_eq!(try_reap_child(&mut sched, parent, None).unwrap(), None);

        exit_task(&mut sched, child, encode_exit_status(7, None)).unwrap();
        assert_eq!(sched.tasks.get(child).unwrap().state, TaskState::Zombie);

        let (reaped, status) = try_reap_child(&mut sched, parent, None).unwrap().unwrap();
        assert_eq!(reaped, child);
        assert_eq!(status, 7 << 8);

        // reaped: stale id no longer resolves
        assert!(sched.tasks.get(child).is_none());
        assert!(sched.tasks.get(parent).unwrap().children.is_empty());
    }

    #[test]
    fn wait_on_nonexistent_child_errors() {
        let mut sched = Scheduler::new();
        let parent = spawn_init(&mut sched);
        let other = spawn_init(&mut sched);
        assert_eq!(
            try_reap_child(&mut sched, parent, Some(other)),
            Err(KernelError::NoSuchTask)
        );
    }

    #[test]
    fn exit_wakes_blocked_parent() {
        let mut sched = Scheduler::new();
        let parent = spawn_init(&mut sched);
        let child = fork(&mut sched, parent, String::from("child")).unwrap();

        sched
            .block_task(parent, wait_channel_for(parent), true)
            .unwrap();
        assert_eq!(sched.tasks.get(parent).unwrap().state, TaskState::Sleeping);

        exit_task(&mut sched, child, 0).unwrap();
        assert_eq!(sched.tasks.get(parent).unwrap().state, TaskState::Ready);
    }

    #[test]
    fn setpgid_applies_to_all_threads_after_single_validation() {
        let mut sched = Scheduler::new();
        let session_owner = spawn_init(&mut sched); // sid == pgid == own index (0)

        // a non-session-leader process group leader, child of the session
        // owner, plus a second thread sharing its tgid
        let grp_leader = fork(&mut sched, session_owner, String::from("grp_leader")).unwrap();
        assert!(sched.tasks.get(grp_leader).unwrap().sid != grp_leader.index());

        let tgid = sched.tasks.get(grp_leader).unwrap().tgid;
        let sid = sched.tasks.get(grp_leader).unwrap().sid;
        let thread2 = sched.tasks.insert_with(|id| Task {
            id,
            name: String::from("thread2"),
            tgid,
            pgid: sched.tasks.get(grp_leader).unwrap().pgid,
            sid,
            parent: Some(grp_leader),
            children: Vec::new(),
            creds: Credentials::root(),
            policy: SchedPolicy::Other,
            priority: 0,
            timeslice: crate::sched::DEFAULT_TIMESLICE,
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

        // new_pgid names the session owner's existing group (pgid 0, same sid)
        let new_pgid = session_owner.index();
        setpgid(&mut sched, grp_leader, new_pgid).unwrap();

        assert_eq!(sched.tasks.get(grp_leader).unwrap().pgid, new_pgid);
        assert_eq!(sched.tasks.get(thread2).unwrap().pgid, new_pgid);
    }

    #[test]
    fn setpgid_rejects_session_leader() {
        let mut sched = Scheduler::new();
        let leader = spawn_init(&mut sched); // sid == own index: session leader
        assert_eq!(
            setpgid(&mut sched, leader, leader.index()),
            Err(KernelError::NotPermitted)
        );
    }
}
