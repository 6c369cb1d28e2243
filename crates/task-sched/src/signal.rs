//! Signal delivery (§3/§4.2.2's "pending ∩ ¬blocked" predicate): pending/
//! blocked sets, sigaction dispatch, and tracer notification. Coupled to
//! task state closely enough that the distilled spec folds it into the
//! scheduler's share of the budget rather than giving it its own module.
use alloc::vec::Vec;

/// Common POSIX signal numbers this workspace names explicitly (job
/// control and the boundary-scenario signals); the remainder of the 1..NSIG
/// range is addressed purely by number.
pub const SIGHUP: u32 = 1;
pub const SIGINT: u32 = 2;
pub const SIGQUIT: u32 = 3;
pub const SIGKILL: u32 = 9;
pub const SIGUSR1: u32 = 10;
pub const SIGSEGV: u32 = 11;
pub const SIGUSR2: u32 = 12;
pub const SIGSTOP: u32 = 19;
pub const SIGTSTP: u32 = 20;
pub const SIGTTIN: u32 = 21;
pub const SIGTTOU: u32 = 22;

/// Highest signal number representable in the 64-bit pending/blocked masks.
pub const NSIG: u32 = 64;

/// SIGKILL and SIGSTOP can never be blocked or caught; a task with one of
/// these pending is always considered to have a deliverable signal
/// regardless of its blocked mask.
pub const UNBLOCKABLE_MASK: u64 = sigmask(SIGKILL) | sigmask(SIGSTOP);

pub const fn sigmask(signo: u32) -> u64 {
    1u64 << (signo - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigDisposition {
    Default,
    Ignore,
    /// Address of a user-mode handler; this workspace does not implement
    /// the user-mode dispatch trampoline, only the kernel-side bookkeeping
    /// of which disposition is installed.
    Handler(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct SigAction {
    pub disposition: SigDisposition,
    /// SA_RESTART and friends; only SA_RESTART is consulted by this
    /// workspace (§7's ERESTARTSYS vs EINTR distinction).
    pub restart: bool,
}

impl Default for SigAction {
    fn default() -> Self {
        SigAction { disposition: SigDisposition::Default, restart: false }
    }
}

/// Per-thread-group sigaction table (handlers are shared across threads of
/// one process per §3's thread-group sharing rules).
pub struct SigActionTable {
    actions: Vec<SigAction>,
}

impl SigActionTable {
    pub fn new() -> Self {
        let mut actions = Vec::with_capacity(NSIG as usize);
        actions.resize_with(NSIG as usize, SigAction::default);
        SigActionTable { actions }
    }

    pub fn get(&self, signo: u32) -> SigAction {
        self.actions[(signo - 1) as usize]
    }

    pub fn set(&mut self, signo: u32, action: SigAction) {
        self.actions[(signo - 1) as usize] = action;
    }
}

impl Default for SigActionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue `signo` into `pending`, respecting "already pending" collapse
/// (standard, non-realtime signals don't queue multiple instances).
pub fn raise(pending: &mut u64, signo: u32) {
    *pending |= sigmask(signo);
}

/// §4.2.2's deliverability predicate: `pending ∩ ¬blocked ∪ unblockable ≠ ∅`.
pub fn has_deliverable_signal(pending: u64, blocked: u64) -> bool {
    let deliverable = pending & !blocked;
    let forced = pending & UNBLOCKABLE_MASK;
    (deliverable | forced) != 0
}

/// Tracer notification: when a traced task receives a signal, the kernel
/// stops it and reports the signal to the tracer instead of delivering it
/// normally (ptrace semantics). This workspace models only the decision of
/// *whether* a signal should be intercepted for tracing, leaving the actual
/// ptrace wire protocol out of scope.
pub fn should_notify_tracer(traced: bool, signo: u32) -> bool {
    traced && signo != SIGKILL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigint_is_deliverable_when_unblocked() {
        let mut pending = 0u64;
        raise(&mut pending, SIGINT);
        assert!(has_deliverable_signal(pending, 0));
    }

    #[test]
    fn blocked_signal_is_not_deliverable() {
        let mut pending = 0u64;
        raise(&mut pending, SIGUSR1);
        assert!(!has_deliverable_signal(pending, sigmask(SIGUSR1)));
    }

    #[test]
    fn sigkill_is_deliverable_even_if_blocked() {
        let mut pending = 0u64;
        raise(&mut pending, SIGKILL);
        assert!(has_deliverable_signal(pending, sigmask(SIGKILL)));
    }

    #[test]
    fn sigaction_table_defaults_to_default_disposition() {
        let table = SigActionTable::new();
        assert_eq!(table.get(SIGTERM_PLACEHOLDER).disposition, SigDisposition::Default);
    }

    const SIGTERM_PLACEHOLDER: u32 = 15;
}
