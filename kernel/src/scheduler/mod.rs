pub mod task;
pub mod context;

use alloc::collections::VecDeque;
use alloc::boxed::Box;
use alloc::vec;
use spin::Mutex;
use lazy_static::lazy_static;
pub use task::{Process, ProcessId, ProcessState, SchedPolicy};
use context::Context;

use task_sched::sched::{DEFAULT_TIMESLICE, FIFO_BASE, NUM_BUCKETS, OTHER_BUCKET, RR_BASE};
use task_sched::sched::{FIFO_LEVELS, RR_LEVELS};
use task_sched::signal;

/// Size of each task's kernel stack (16 KiB).
const TASK_STACK_SIZE: usize = 4096 * 4;

/// Maps a process's `(policy, priority)` onto a ready-queue bucket index,
/// mirroring `task_sched::sched::bucket_for` — bucket 0 is SCHED_OTHER,
/// `RR_BASE..FIFO_BASE` are SCHED_RR levels, `FIFO_BASE..NUM_BUCKETS` are
/// SCHED_FIFO levels.
fn bucket_for(policy: SchedPolicy, priority: u8) -> usize {
    match policy {
        SchedPolicy::Other | SchedPolicy::Idle => OTHER_BUCKET,
        SchedPolicy::Rr => RR_BASE + (priority as usize).min(RR_LEVELS - 1),
        SchedPolicy::Fifo => FIFO_BASE + (priority as usize).min(FIFO_LEVELS - 1),
    }
}

/// The global scheduler state.
pub struct Scheduler {
    /// Currently running process (if any).
    pub current: Option<Process>,
    /// Priority-bucketed ready queues (§4.2): FIFO buckets scanned high to
    /// low, then RR buckets high to low, then the single OTHER bucket.
    /// Generalizes the single flat `VecDeque<Process>` this used to be.
    ready: [VecDeque<Process>; NUM_BUCKETS],
    /// Next process ID to assign.
    next_id: u64,
    /// Whether the scheduler is active (context switches enabled).
    pub active: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            current: None,
            ready: core::array::from_fn(|_| VecDeque::new()),
            next_id: 1,
            active: false,
        }
    }

    fn push_ready_tail(&mut self, p: Process) {
        let bucket = bucket_for(p.policy, p.priority);
        self.ready[bucket].push_back(p);
    }

    fn ready_is_empty(&self) -> bool {
        self.ready.iter().all(|q| q.is_empty())
    }

    /// Total number of tasks sitting across every priority bucket (used by
    /// the `yield` shell command to report whether there's anyone to switch to).
    pub fn ready_count(&self) -> usize {
        self.ready.iter().map(|q| q.len()).sum()
    }

    /// §4.2.1: scan FIFO buckets high→low, then RR high→low, then OTHER.
    /// Skips (and requeues) Blocked/Zombie entries the same way the old
    /// flat-queue loop did, just across buckets instead of one queue.
    fn pop_next_runnable(&mut self) -> Option<Process> {
        let order = (FIFO_BASE..NUM_BUCKETS)
            .rev()
            .chain((RR_BASE..FIFO_BASE).rev())
            .chain(core::iter::once(OTHER_BUCKET));
        for bucket in order {
            let len = self.ready[bucket].len();
            for _ in 0..len {
                let p = match self.ready[bucket].pop_front() {
                    Some(p) => p,
                    None => break,
                };
                if p.state == ProcessState::Ready || p.state == ProcessState::Running {
                    return Some(p);
                }
                self.ready[bucket].push_back(p);
            }
        }
        None
    }

    fn iter_ready(&self) -> impl Iterator<Item = &Process> {
        self.ready.iter().flat_map(|q| q.iter())
    }

    fn iter_ready_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.ready.iter_mut().flat_map(|q| q.iter_mut())
    }

    /// Spawn a new kernel process with the given entry point and name.
    pub fn spawn(&mut self, entry: fn(), name: &str) -> ProcessId {
        let id = ProcessId(self.next_id);
        self.next_id += 1;

        // Allocate a kernel stack for the new process
        let stack = vec![0u8; TASK_STACK_SIZE].into_boxed_slice();
        let mut stack_top = stack.as_ptr() as usize + TASK_STACK_SIZE;
        stack_top &= !0xF; // STRICT 16-byte alignment

        // Build the initial context: RIP = entry, RSP = stack_top
        let ctx = Context::new(entry as u64, stack_top as u64);

        // Kernel processes (like Init/Shell/Threads) just use the current kernel P4 root
        // For real userspace isolation this will be customized later.
        use x86_64::registers::control::Cr3;
        let (current_p4, _) = Cr3::read();
        let current_p4_addr = current_p4.start_address().as_u64();

        let process = Process {
            pid: id,
            parent_pid: None,
            name: alloc::string::String::from(name),
            state: ProcessState::Ready,
            exit_status: None,
            children: alloc::vec::Vec::new(),
            context: ctx,
            page_table: current_p4_addr,
            _kernel_stack: stack,
            user_allocations: alloc::vec::Vec::new(),
            fd_table: create_default_fd_table(),
            _image: None,
            policy: SchedPolicy::Other,
            priority: 0,
            timeslice: DEFAULT_TIMESLICE,
            cpuid: -1,
            pending_signals: 0,
            blocked_signals: 0,
        };

        self.push_ready_tail(process);
        id
    }

    /// Pick the next ready process. Returns None if queue is empty.
    pub fn schedule_next(&mut self) -> Option<Process> {
        self.pop_next_runnable()
    }

    /// Wakes up all processes that are currently in the Blocked state.
    /// This is used heavily by the Pipe IPC mechanism so readers/writers
    /// retry their data transfer conditions.
    pub fn wake_all_blocked(&mut self) {
        let mut any_woken = false;
        for process in self.iter_ready_mut() {
            if process.state == ProcessState::Blocked {
                process.state = ProcessState::Ready;
                any_woken = true;
            }
        }

        // Also check if the *current* process was somehow marked Blocked
        if let Some(current) = self.current.as_mut() {
            if current.state == ProcessState::Blocked {
                current.state = ProcessState::Ready;
                any_woken = true;
            }
        }

        if any_woken {
            // crate::log_info!("scheduler: wake_all_blocked activated sleeping processes");
        }
    }

    /// Deliver `signo` to the process named by `pid`, wherever it sits in
    /// the ready buckets (the current process is handled by the caller,
    /// since sending a signal to oneself has no queue to search). Returns
    /// `NoSuchTask` if no matching process is found.
    pub fn signal_pid(&mut self, pid: ProcessId, signo: u32) -> task_sched::KernelResult<()> {
        for p in self.iter_ready_mut() {
            if p.pid == pid {
                signal::raise(&mut p.pending_signals, signo);
                if p.state == ProcessState::Blocked {
                    p.state = ProcessState::Ready;
                }
                return Ok(());
            }
        }
        Err(task_sched::KernelError::NoSuchTask)
    }
}

lazy_static! {
    pub static ref SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());
}

/// Initialize the scheduler. Create Process 0 (kernel/shell) as the current process.
pub fn init() {
    let mut sched = SCHEDULER.lock();

    use x86_64::registers::control::Cr3;
    let (current_p4, _) = Cr3::read();
    let current_p4_addr = current_p4.start_address().as_u64();

    // Process 0 = the kernel main thread (shell). Its context will be filled on first switch.
    let kernel_process = Process {
        pid: ProcessId(0),
        parent_pid: None,
        name: alloc::string::String::from("kernel"),
        state: ProcessState::Running,
        exit_status: None,
        children: alloc::vec::Vec::new(),
        context: Context::empty(),
        page_table: current_p4_addr,
        _kernel_stack: Box::new([]),
        user_allocations: alloc::vec::Vec::new(),
        fd_table: create_default_fd_table(),
        _image: None,
        policy: SchedPolicy::Other,
        priority: 0,
        timeslice: DEFAULT_TIMESLICE,
        cpuid: 0,
        pending_signals: 0,
        blocked_signals: 0,
    };
    sched.current = Some(kernel_process);
    sched.active = true;
    drop(sched);

    crate::log_info!("Scheduler initialized with cooperative multitasking.");
}

/// Spawn a new kernel process from anywhere in the kernel.
pub fn spawn(entry: fn(), name: &str) -> ProcessId {
    let mut sched = SCHEDULER.lock();
    let id = sched.spawn(entry, name);
    // crate::log_info!("Spawned process '{}' with PID {}", name, id.0);
    id
}

/// Spawn a completely customized process (Used by ELF loader / Fork).
/// It allows specifying a custom Page Table (CR3) and initial context.
pub fn spawn_process(name: &str, page_table: u64, entry: u64, _user_stack_top: u64, allocations: alloc::vec::Vec<(u64, u64)>) -> ProcessId {
    let mut sched = SCHEDULER.lock();

    let id = ProcessId(sched.next_id);
    sched.next_id += 1;

    // Allocate a separate KERNEL stack for the process (needed for Ring 3 -> Ring 0 transitions)
    let kernel_stack = vec![0u8; TASK_STACK_SIZE].into_boxed_slice();
    let mut kernel_stack_top = kernel_stack.as_ptr() as usize + TASK_STACK_SIZE;
    kernel_stack_top &= !0xF; // Enforce 16-byte hardware alignment

    // Build the initial context: RIP = trampoline or entry, but since this is
    // for Ring 3, the jump must happen inside the trampoline.
    let ctx = Context::new(entry, kernel_stack_top as u64);

    let process = Process {
        pid: id,
        parent_pid: None,
        name: alloc::string::String::from(name),
        state: ProcessState::Ready,
        exit_status: None,
        children: alloc::vec::Vec::new(),
        context: ctx,
        page_table,
        _kernel_stack: kernel_stack,
        user_allocations: allocations,
        fd_table: create_default_fd_table(),
        _image: None,
        policy: SchedPolicy::Other,
        priority: 0,
        timeslice: DEFAULT_TIMESLICE,
        cpuid: -1,
        pending_signals: 0,
        blocked_signals: 0,
    };

    sched.push_ready_tail(process);

    // crate::log_info!("Spawned custom process '{}' with PID {}", name, id.0);
    id
}

/// Try to cooperatively yield the CPU to the next ready task if the scheduler isn't locked.
/// This prevents Deadlocks when the Timer Interrupt fires while the kernel is holding the lock!
pub fn try_yield_now() {
    x86_64::instructions::interrupts::without_interrupts(|| {
        let mut sched = match SCHEDULER.try_lock() {
            Some(lock) => lock,
            None => return, // Don't yield if scheduler is busy! (e.g. inside a syscall setup)
        };

        if !sched.active || sched.ready_is_empty() {
            return;
        }

        if let Some(mut current) = sched.current.take() {
            let mut next = match sched.schedule_next() {
                Some(n) => n,
                None => { sched.current = Some(current); return; }
            };

            current.state = ProcessState::Ready;
            next.state = ProcessState::Running;

            let mut next_stack_top = next._kernel_stack.as_ptr() as u64 + TASK_STACK_SIZE as u64;
            next_stack_top &= !0xF;
            crate::interrupts::gdt::set_tss_rsp0(next_stack_top);

            // Find the bucket `current` will land in, then push it, so we can
            // take a stable pointer into its new resting place before the
            // lock is dropped.
            let outgoing_bucket = bucket_for(current.policy, current.priority);
            sched.ready[outgoing_bucket].push_back(current);
            sched.current = Some(next);

            let current_ctx_ptr = &mut sched.ready[outgoing_bucket].back_mut().unwrap().context as *mut Context;
            let next_ctx_ptr = &sched.current.as_ref().unwrap().context as *const Context;

            unsafe {
                let cr3_val = sched.current.as_ref().unwrap().page_table;
                core::arch::asm!("mov cr3, {0}", in(reg) cr3_val);
            }

            drop(sched);

            unsafe { context::switch_context(current_ctx_ptr, next_ctx_ptr); }
        }
    });
}

/// Cooperatively yield the CPU to the next ready task.
pub fn yield_now() {
    // Disable interrupts during context switch for safety
    x86_64::instructions::interrupts::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();
        if !sched.active || sched.ready_is_empty() {
            return;
        }

        // Take the current process out
        if let Some(mut current) = sched.current.take() {
            let mut next = match sched.schedule_next() {
                Some(n) => n,
                None => { sched.current = Some(current); return; }
            };

            current.state = ProcessState::Ready;
            next.state = ProcessState::Running;

            // Calculate next kernel stack top
            let mut next_stack_top = next._kernel_stack.as_ptr() as u64 + TASK_STACK_SIZE as u64;
            next_stack_top &= !0xF;
            crate::interrupts::gdt::set_tss_rsp0(next_stack_top);

            // Put current back in its bucket, set next as current. MOVES
            // HAPPEN HERE: we must do this BEFORE taking pointers!
            let outgoing_bucket = bucket_for(current.policy, current.priority);
            sched.ready[outgoing_bucket].push_back(current);
            sched.current = Some(next);

            // NOW grab the valid pointers from their permanent heap locations
            // within the guaranteed-stable VecDeque buffer.
            let current_ctx_ptr = &mut sched.ready[outgoing_bucket].back_mut().unwrap().context as *mut Context;
            let next_ctx_ptr = &sched.current.as_ref().unwrap().context as *const Context;

            // Load the new process's Page Table (CR3)
            unsafe {
                let cr3_val = sched.current.as_ref().unwrap().page_table;
                core::arch::asm!(
                    "mov cr3, {0}",
                    in(reg) cr3_val
                );
            }

            // Drop the lock BEFORE switching context
            drop(sched);

            // crate::log_info!("yield_now: switching CPU to next task");

            // Perform the actual context switch via assembly
            unsafe { context::switch_context(current_ctx_ptr, next_ctx_ptr); }
        }
    });
}

/// Terminate the current process and switch to the next one.
pub fn exit_current(exit_code: u64) {
    // Disable interrupts to ensure atomicity
    x86_64::instructions::interrupts::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();

        // 1. Remove the current process, transform to Zombie, free User allocations
        let mut finished = sched.current.take().expect("exit_current called without an active process");

        // crate::log_info!("Process '{}' (PID {}) exiting with code {}.", finished.name, finished.pid.0, exit_code);

        finished.state = ProcessState::Zombie;
        finished.exit_status = Some(exit_code);

        // Free user allocations!
        for (vaddr, size) in &finished.user_allocations {
            crate::memory::paging::free_user_memory(x86_64::VirtAddr::new(*vaddr), *size);
        }
        finished.user_allocations.clear();

        // Phase 5.4: Drop all file descriptors immediately!
        // This drops the Arc Rc. If Rc == 0, the underlying Pipe/File is cleaned up.
        // Doing this before becoming a Zombie ensures we don't leak FDs and signal EOF to readers.
        for slot in finished.fd_table.iter_mut() {
            *slot = None;
        }

        // Wake up Parent if it was waiting
        if let Some(parent_pid) = finished.parent_pid {
            for proc in sched.iter_ready_mut() {
                if proc.pid == parent_pid && proc.state == ProcessState::Blocked {
                    proc.state = ProcessState::Ready;
                    break;
                }
            }
        }

        // Put the Zombie back in its bucket so `wait` can find it later
        sched.push_ready_tail(finished);

        // 2. We MUST switch to the next task now
        let mut next = loop {
            match sched.schedule_next() {
                Some(n) => break n,
                None => {
                    // No tasks left at all (not even the shell).
                    // crate::log_info!("All tasks finished. System halted.");
                    drop(sched);
                    loop { x86_64::instructions::hlt(); }
                }
            }
        };

        next.state = ProcessState::Running;

        let mut next_stack_top = next._kernel_stack.as_ptr() as u64 + TASK_STACK_SIZE as u64;
        next_stack_top &= !0xF;
        crate::interrupts::gdt::set_tss_rsp0(next_stack_top);

        // We must place it in `sched.current` before getting its context pointer.
        sched.current = Some(next);

        // Get the raw pointer to the next context IN its new memory location.
        let next_ctx_ptr = &sched.current.as_ref().unwrap().context as *const Context;

        // Load the new process's Page Table (CR3)
        unsafe {
            let cr3_val = sched.current.as_ref().unwrap().page_table;
            core::arch::asm!(
                "mov cr3, {0}",
                in(reg) cr3_val
            );
        }

        // Drop scheduler lock before jumping
        drop(sched);

        // 3. Jump to the next task without saving the current state
        unsafe {
            context::restore_context(next_ctx_ptr);
        }
    });

    unreachable!("exit_current should never return");
}

/// Get a snapshot of all processes for display purposes (used by `ps` command).
pub fn list_tasks() -> alloc::vec::Vec<(u64, alloc::string::String, alloc::string::String)> {
    let sched = SCHEDULER.lock();
    let mut result = alloc::vec::Vec::new();

    if let Some(ref current) = sched.current {
        result.push((current.pid.0, current.name.clone(), alloc::string::String::from("running")));
    }
    for proc in sched.iter_ready() {
        result.push((proc.pid.0, proc.name.clone(), alloc::format!("{:?}", proc.state)));
    }

    result
}

/// The pid of the currently running task, if any — this cooperative,
/// single-console kernel has no real process-group/session table, so tty job
/// control (`tty-core`'s `send_signal_to_pgroup`) treats "foreground group"
/// as "whatever task is currently scheduled" and targets it directly.
pub fn foreground_pid() -> Option<u64> {
    SCHEDULER.lock().current.as_ref().map(|p| p.pid.0)
}

/// Send `signo` to the process named by `pid` (the shell's `kill` command).
/// Raises the signal in its pending mask and, if it was SIGKILL, zombifies it
/// immediately rather than waiting for a cooperative check point that this
/// single-core build never reaches for a non-running task.
pub fn signal_process(pid: u64, signo: u32) -> task_sched::KernelResult<()> {
    let mut sched = SCHEDULER.lock();

    if let Some(current) = sched.current.as_mut() {
        if current.pid.0 == pid {
            signal::raise(&mut current.pending_signals, signo);
            return Ok(());
        }
    }

    sched.signal_pid(ProcessId(pid), signo)?;

    if signo == signal::SIGKILL {
        for proc in sched.iter_ready_mut() {
            if proc.pid.0 == pid && proc.state != ProcessState::Zombie {
                proc.state = ProcessState::Zombie;
                proc.exit_status = Some(task_sched::lifecycle::encode_exit_status(0, Some((signo as u8, false))) as u64);
                for slot in proc.fd_table.iter_mut() {
                    *slot = None;
                }
                break;
            }
        }
    }

    Ok(())
}

/// Syscall fork: Duplicate the current process (parent) into a new running process (child).
/// Returns Child PID to Parent, 0 to Child.
pub fn sys_fork() -> u64 {
    let mut sched = SCHEDULER.lock();

    // Extract everything we need from current to drop the borrow
    let (parent_pid, parent_name, child_allocations, parent_stack_ptr, parent_image, parent_fd_table, parent_policy, parent_priority) = {
        let current_proc = match sched.current.as_ref() {
            Some(p) => p,
            None => return u64::MAX,
        };
        (
            current_proc.pid,
            current_proc.name.clone(),
            current_proc.user_allocations.clone(),
            current_proc._kernel_stack.as_ptr(),
            None, // Phase 5.3 memory mapping isolates physical frames manually, no need to clone the legacy image!
            current_proc.fd_table.clone(),
            current_proc.policy,
            current_proc.priority,
        )
    };

    // crate::log_info!("sys_fork: allocating P4 phys...");

    // 2. Clone the User Page Table and Allocations
    let child_p4_phys = match crate::memory::paging::create_new_page_table() {
        Some(addr) => addr,
        None => return u64::MAX, // Out of memory
    };

    // crate::log_info!("sys_fork: deep_clone_process_memory started...");

    // Execute Deep Copy of physical Memory Frames!
    if !crate::memory::paging::deep_clone_process_memory(child_p4_phys, &child_allocations) {
        crate::log_error!("sys_fork: Failed to deep copy memory frames!");
        return u64::MAX;
    }

    // crate::log_info!("sys_fork: P4 clone finished! Allocating child kernel stack...");

    // 3. Allocate a fresh independent Kernel Stack for the child
    let child_kernel_stack = vec![0u8; TASK_STACK_SIZE].into_boxed_slice();
    let mut child_stack_top = child_kernel_stack.as_ptr() as u64 + TASK_STACK_SIZE as u64;
    child_stack_top &= !0xF; // Strict 16-byte boundary

    // 4. Copy the User Context (TrapFrame) exactly
    // Subtract 152 bytes (19 * 8 bytes) to match exactly what is pushed by the CPU + syscall handler!
    let mut parent_stack_top = parent_stack_ptr as u64 + TASK_STACK_SIZE as u64;
    parent_stack_top &= !0xF;

    let trap_frame_ptr = (parent_stack_top - 152) as *const TrapFrame;
    let trap_frame = unsafe { *trap_frame_ptr };

    let child_trap_frame_ptr = (child_stack_top - 152) as *mut TrapFrame;
    unsafe { *child_trap_frame_ptr = trap_frame; }

    // Set child's Context to resume at `fork_trampoline` with RSP pointing at the TrapFrame
    let mut child_context = Context::empty();
    child_context.rsp = child_stack_top - 152;
    child_context.rip = fork_trampoline as *const () as u64;

    // 5. Construct Process
    let child_pid = ProcessId(sched.next_id);
    sched.next_id += 1;

    let child_name = alloc::format!("{}_child", parent_name);

    let child_process = Process {
        pid: child_pid,
        parent_pid: Some(parent_pid),
        name: child_name,
        state: ProcessState::Ready,
        exit_status: None,
        children: alloc::vec::Vec::new(),
        context: child_context,
        page_table: child_p4_phys.as_u64(),
        _kernel_stack: child_kernel_stack,
        user_allocations: child_allocations,
        fd_table: parent_fd_table, // Exact clone()! Bumps Arc ref counts seamlessly!
        _image: parent_image,
        policy: parent_policy,
        priority: parent_priority,
        timeslice: DEFAULT_TIMESLICE,
        cpuid: -1,
        pending_signals: 0,
        blocked_signals: 0,
    };

    // 6. Push Child to Parent list and scheduler
    let current_proc_mut = sched.current.as_mut().unwrap();
    current_proc_mut.children.push(child_pid);

    sched.push_ready_tail(child_process);

    // crate::log_info!("sys_fork: Process {} created Child Process {}", parent_pid.0, child_pid.0);

    child_pid.0
}

/// Syscall exec: Replace the current process with a new ELF binary.
/// On success it NEVER returns here, it jumps manually into the new program.
/// Returns only if there was an error loading the file.
pub fn sys_exec(path: &str) -> Result<(), crate::loader::elf::ExecError> {
    // CRITICAL: Copy path into kernel-owned memory BEFORE we free user pages!
    // `path` is a &str pointing into user-space memory which will be unmapped below.
    let owned_path = alloc::string::String::from(path);

    // 1. Construct the new User Image Memory Map
    let params = match crate::loader::elf::parse_and_map_elf(&owned_path) {
        Ok(p) => p,
        Err(e) => return Err(e),
    };

    // crate::log_info!("sys_exec: replacing current process with '{}'", owned_path);

    x86_64::instructions::interrupts::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();

        let current = sched.current.as_mut().expect("sys_exec called without active process!");

        // 2. Free old virtual memory allocations
        for (vaddr, size) in &current.user_allocations {
            crate::memory::paging::free_user_memory(x86_64::VirtAddr::new(*vaddr), *size);
        }

        // 3. Swap in new Page Table and Allocations
        current.page_table = params.page_table;
        current.user_allocations = params.allocations;
        current.name = owned_path;

        // 4. Reset the Kernel Stack to a clean slate over the current frame!
        // We reset `current.context.rsp` to the top of the kernel stack where a fresh
        // Ring 3 trampoline will be orchestrated.
        let mut kernel_stack_top = current._kernel_stack.as_ptr() as u64 + TASK_STACK_SIZE as u64;
        kernel_stack_top &= !0xF;

        // We use the `Context` struct purely to point to the trampoline inside ring 0!
        current.context = Context::new(crate::loader::elf::usermode_trampoline as *const () as u64, kernel_stack_top);

        // Inject R12 and R13 for trampoline usage
        current.context.r12 = params.entry;
        current.context.r13 = params.user_stack_top;

        // Securely prepare CPU for context replacement
        crate::interrupts::gdt::set_tss_rsp0(kernel_stack_top);

        // 5. Explicitly Load the New CR3
        unsafe {
            core::arch::asm!(
                "mov cr3, {0}",
                in(reg) current.page_table
            );
        }

        let next_ctx_ptr = &current.context as *const Context;

        // 6. Jump linearly into the trampoline (Wipes out old Syscall state!)
        drop(sched);
        unsafe {
            crate::scheduler::context::restore_context(next_ctx_ptr);
        }
    });

    unreachable!("sys_exec should never return on success");
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct TrapFrame {
    pub rcx: u64,
    pub rbx: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

#[unsafe(naked)]
pub extern "C" fn fork_trampoline() {
    unsafe {
        core::arch::naked_asm!(
            "xor rax, rax",  // Return 0 for child!
            "pop rcx",
            "pop rbx",
            "pop rdi",
            "pop rsi",
            "pop rdx",
            "pop rbp",
            "pop r8",
            "pop r9",
            "pop r10",
            "pop r11",
            "pop r12",
            "pop r13",
            "pop r14",
            "pop r15",
            "iretq"
        );
    }
}

/// Syscall wait: Wait for a child process to change state to Zombie, then reap it.
/// If `target_pid` is u64::MAX (-1), wait for ANY child.
/// Returns the Exit Status of the child, or u64::MAX if no children exist.
pub fn sys_wait(target_pid: u64) -> u64 {
    loop {
        let mut sched = SCHEDULER.lock();
        let current_pid = sched.current.as_ref().map(|p| p.pid).unwrap_or(ProcessId(0));

        let mut child_found = false;
        let mut reaped_pid = None;
        let mut reaped_status = 0;

        // 1. Scan every ready bucket for a matching Zombie child
        for proc in sched.iter_ready() {
            if proc.parent_pid == Some(current_pid) {
                if target_pid == u64::MAX || proc.pid.0 == target_pid {
                    child_found = true;
                    if proc.state == ProcessState::Zombie {
                        reaped_pid = Some(proc.pid);
                        reaped_status = proc.exit_status.unwrap_or(0);
                        break;
                    }
                }
            }
        }

        if let Some(pid) = reaped_pid {
            // A Zombie was found! We must reap it (Remove it entirely from scheduler)
            for bucket in sched.ready.iter_mut() {
                bucket.retain(|p| p.pid != pid);
            }

            // Remove it from current process's children tracking list
            if let Some(current) = sched.current.as_mut() {
                current.children.retain(|&c| c != pid);
            }

            // crate::log_info!("sys_wait: Process {} reaped Zombie child {}", current_pid.0, pid.0);
            return reaped_status;
        }

        if !child_found {
            // No matching children exist computationally. Return error.
            return u64::MAX;
        }

        // 2. Child exists but is still Running/Ready. We must BLOCK and yield!
        if let Some(current) = sched.current.as_mut() {
            current.state = ProcessState::Blocked;
        }

        drop(sched);

        // Explicitly enable interrupts before yielding so the Timer can preempt us!
        // We are inside an int 0x80 gate where IF=0. If we don't enable it, IF remains 0
        // after the context switch to other ring 0 tasks.
        x86_64::instructions::interrupts::enable();

        // Wait efficiently for the next interrupt (like a Timer Tick) to fire, avoiding 100% CPU loops!
        x86_64::instructions::hlt();

        yield_now();
    }
}

/// Helper method to create a clean FD Table pointing to the Console for Stdin/Stdout/Stderr
fn create_default_fd_table() -> alloc::vec::Vec<Option<alloc::sync::Arc<spin::Mutex<crate::fs::fd::File>>>> {
    use crate::fs::fd::File;
    let mut table = alloc::vec::Vec::with_capacity(64);
    for _ in 0..64 {
        table.push(None); // Empty table slots
    }
    table[0] = Some(File::new_console()); // STDIN
    table[1] = Some(File::new_console()); // STDOUT
    table[2] = Some(File::new_console()); // STDERR
    table
}

/// Global wrapper to wake up all blocked tasks (e.g., when pipe data arrives or space frees).
pub fn wake_all_blocked() {
    // try_lock used because this is often called mid-syscall when the lock might already
    // be taken, or just before another lock sequence.
    if let Some(mut sched) = SCHEDULER.try_lock() {
        sched.wake_all_blocked();
    }
}
