//! Per-task state (spec.md §3 `Task`, §4.J "current_task").
//!
//! "One task exists in this core" (spec.md §5): a single statically
//! allocated [`Task`] behind a [`SpinLock`], pid 0, no scheduler.

use crate::fs::file::File;
use crate::sync::spinlock::SpinLock;
use crate::tty::Tty;

/// Per-task fd table size (spec.md §3 `FileDescriptorTable`: "small
/// array (<=8)").
pub const MAX_OPEN: usize = 8;

pub struct Task {
    pub pid: i32,
    pub errno: i32,
    pub tty: Option<&'static Tty>,
    pub fd_table: [Option<*mut File>; MAX_OPEN],
}

impl Task {
    const fn new(pid: i32) -> Self {
        Self {
            pid,
            errno: 0,
            tty: None,
            fd_table: [None; MAX_OPEN],
        }
    }

    /// Finds the lowest-numbered free fd slot.
    pub fn next_free_fd(&self) -> Option<usize> {
        self.fd_table.iter().position(|slot| slot.is_none())
    }
}

// SAFETY: `*mut File` entries point into the system-wide file pool
// (`crate::fs::MAX_OPEN_FILES`-capacity, `'static` storage); the task
// itself is only ever reached through `TASK`'s spinlock, so no two
// contexts observe the table concurrently.
unsafe impl Send for Task {}

static TASK: SpinLock<Task> = SpinLock::new(Task::new(0));

/// Locks and returns the single task (spec.md §4.J `current_task()`).
pub fn current_task() -> crate::sync::spinlock::SpinLockGuard<'static, Task> {
    TASK.lock()
}

pub fn current_pid() -> i32 {
    current_task().pid
}

/// `_exit(status)`: logs and spins forever (spec.md §5 "the kernel spins
/// in an idle loop at the end of `_exit`" — there is no process to reap
/// and no scheduler to hand off to).
pub fn exit(status: i32) -> ! {
    crate::kinfo!("process: task {} exited with status {}", current_pid(), status);
    loop {
        crate::arch::cpu::enable_interrupts();
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack));
        }
    }
}
