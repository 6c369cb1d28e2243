use crate::println;
use task_sched::signal::SIGKILL;

/// kill <pid> — send SIGKILL to a task via the scheduler's signal path.
pub fn run(args: &str) {
    let pid_str = args.trim();
    if pid_str.is_empty() {
        println!("kill: usage: kill <pid>");
        return;
    }

    let pid: u64 = match pid_str.parse() {
        Ok(v) => v,
        Err(_) => { println!("kill: invalid pid: {}", pid_str); return; }
    };

    if pid == 0 {
        println!("kill: cannot kill kernel (pid 0)");
        return;
    }

    match crate::scheduler::signal_process(pid, SIGKILL) {
        Ok(()) => println!("Sent SIGKILL to pid {}", pid),
        Err(e) => println!("kill: {}", e),
    }
}
