//! Thread control blocks.
//!
//! A [`Thread`] is plain data owned by the kernel's [`ThreadTable`]. Every
//! other component refers to it by [`ThreadId`]; destruction is removal
//! from the table.

use core::fmt;
use core::num::NonZeroUsize;

use crate::addrspace::AddressSpace;
use crate::arch::{Arch, UserRegisters};
use crate::kernel::Kernel;
use crate::mem::{Stack, STACK_CANARY};
use crate::time::Ticks;

extern crate alloc;
use alloc::boxed::Box;
use alloc::string::String;

pub mod builder;
pub mod table;

pub use builder::ThreadBuilder;
pub use table::ThreadTable;

/// Static scheduling priority. Lower values are scheduled first.
pub type Priority = i32;

/// Priority given to threads that do not ask for one.
pub const DEFAULT_PRIORITY: Priority = 100;

/// Start routine of a forked thread. Receives the kernel and the argument
/// passed to `fork`.
pub type ThreadEntry<A> = fn(&mut Kernel<A>, usize);

/// Process-unique thread identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroUsize);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ThreadId {
    /// Create a thread id, `None` for zero.
    pub fn new(id: usize) -> Option<Self> {
        NonZeroUsize::new(id).map(Self)
    }

    /// Get the raw ID value.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Lifecycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Created but never admitted to the ready queue
    JustCreated,
    /// Owns the processor
    Running,
    /// In the ready queue
    Ready,
    /// Waiting for a wake-up
    Blocked,
    /// Done, waiting to be destroyed
    Finished,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::JustCreated => "JUST_CREATED",
            ThreadStatus::Running => "RUNNING",
            ThreadStatus::Ready => "READY",
            ThreadStatus::Blocked => "BLOCKED",
            ThreadStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point and argument recorded by `fork`, consumed on first dispatch.
pub struct StartRoutine<A: Arch> {
    pub entry: ThreadEntry<A>,
    pub arg: usize,
}

/// Thread control block.
pub struct Thread<A: Arch> {
    id: ThreadId,
    name: String,
    pub(crate) status: ThreadStatus,
    priority: Priority,

    // burst history feeding the SJF predictor
    pub(crate) prev_cpu_burst: Ticks,
    pub(crate) prev_expected_cpu_burst: f64,

    pub(crate) wait_time_sum: Ticks,
    pub(crate) curr_wait_start: Ticks,
    pub(crate) curr_cpu_burst_start: Ticks,
    pub(crate) cpu_burst_count: u64,

    space: Option<Box<dyn AddressSpace>>,
    user_registers: UserRegisters,

    pub(crate) context: A::SavedContext,
    pub(crate) stack: Option<Stack>,
    pub(crate) start: Option<StartRoutine<A>>,
}

impl<A: Arch> Thread<A> {
    /// Create a thread control block with no stack and no address space.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier assigned by the thread table
    /// * `name` - Debugging name
    /// * `priority` - Static priority, lower runs first
    pub fn new(id: ThreadId, name: String, priority: Priority) -> Self {
        Self {
            id,
            name,
            status: ThreadStatus::JustCreated,
            priority,
            prev_cpu_burst: 0,
            prev_expected_cpu_burst: 0.0,
            wait_time_sum: 0,
            curr_wait_start: 0,
            curr_cpu_burst_start: 0,
            cpu_burst_count: 0,
            space: None,
            user_registers: UserRegisters::default(),
            context: Default::default(),
            stack: None,
            start: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Length of the last completed CPU burst, 0 if none.
    pub fn prev_cpu_burst(&self) -> Ticks {
        self.prev_cpu_burst
    }

    /// Current EWMA estimate of the next burst.
    pub fn prev_expected_cpu_burst(&self) -> f64 {
        self.prev_expected_cpu_burst
    }

    /// Total ticks spent in the ready queue.
    pub fn wait_time_sum(&self) -> Ticks {
        self.wait_time_sum
    }

    /// Number of times the thread was dispatched.
    pub fn cpu_burst_count(&self) -> u64 {
        self.cpu_burst_count
    }

    pub fn curr_cpu_burst_start(&self) -> Ticks {
        self.curr_cpu_burst_start
    }

    pub fn address_space(&self) -> Option<&dyn AddressSpace> {
        self.space.as_deref()
    }

    /// Attach the user program this thread runs.
    pub fn set_address_space(&mut self, space: Box<dyn AddressSpace>) {
        self.space = Some(space);
    }

    pub fn user_registers(&self) -> &UserRegisters {
        &self.user_registers
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    pub fn stack_mut(&mut self) -> Option<&mut Stack> {
        self.stack.as_mut()
    }

    pub fn context(&self) -> &A::SavedContext {
        &self.context
    }

    /// Panic if the stack canary was overwritten.
    ///
    /// Threads without an allocated stack (the bootstrap thread) pass.
    pub fn check_overflow(&self) {
        if let Some(stack) = &self.stack {
            assert!(
                stack.check_canary(STACK_CANARY),
                "stack overflow detected in thread {} ({})",
                self.name,
                self.id
            );
        }
    }

    /// Enter the running state at `now`, closing the current wait.
    pub(crate) fn start_running(&mut self, now: Ticks) {
        self.status = ThreadStatus::Running;
        self.wait_time_sum += now.saturating_sub(self.curr_wait_start);
        self.curr_cpu_burst_start = now;
        self.cpu_burst_count += 1;
    }

    /// Close the current burst at `now`.
    ///
    /// # Returns
    ///
    /// Length of the burst. A nonzero burst becomes `prev_cpu_burst`.
    pub(crate) fn end_burst(&mut self, now: Ticks) -> Ticks {
        let burst = now.saturating_sub(self.curr_cpu_burst_start);
        if burst > 0 {
            self.prev_cpu_burst = burst;
        }
        burst
    }

    pub(crate) fn save_user_state(&mut self, arch: &mut A) {
        if let Some(space) = self.space.as_mut() {
            arch.save_user_registers(&mut self.user_registers);
            space.save_state_on_switch();
        }
    }

    pub(crate) fn restore_user_state(&mut self, arch: &mut A) {
        if let Some(space) = self.space.as_mut() {
            arch.restore_user_registers(&self.user_registers);
            space.restore_state_on_switch();
        }
    }
}

impl<A: Arch> fmt::Debug for Thread<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("prev_cpu_burst", &self.prev_cpu_burst)
            .field("prev_expected_cpu_burst", &self.prev_expected_cpu_burst)
            .field("wait_time_sum", &self.wait_time_sum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::CooperativeArch;
    use crate::mem::{StackPool, StackSizeClass};

    fn thread(name: &str) -> Thread<CooperativeArch> {
        Thread::new(ThreadId::new(1).unwrap(), String::from(name), DEFAULT_PRIORITY)
    }

    #[test]
    fn test_thread_creation() {
        let t = thread("worker");
        assert_eq!(t.id().get(), 1);
        assert_eq!(t.name(), "worker");
        assert_eq!(t.status(), ThreadStatus::JustCreated);
        assert_eq!(t.priority(), 100);
        assert_eq!(t.prev_cpu_burst(), 0);
        assert!(t.stack().is_none());
    }

    #[test]
    fn test_zero_is_not_a_thread_id() {
        assert_eq!(ThreadId::new(0), None);
        assert_eq!(ThreadId::new(7).map(ThreadId::get), Some(7));
    }

    #[test]
    fn test_wait_and_burst_accounting() {
        let mut t = thread("worker");
        t.curr_wait_start = 10;
        t.start_running(25);
        assert_eq!(t.status(), ThreadStatus::Running);
        assert_eq!(t.wait_time_sum(), 15);
        assert_eq!(t.cpu_burst_count(), 1);

        assert_eq!(t.end_burst(31), 6);
        assert_eq!(t.prev_cpu_burst(), 6);

        t.start_running(40);
        assert_eq!(t.wait_time_sum(), 45);
        assert_eq!(t.end_burst(40), 0);
        assert_eq!(t.prev_cpu_burst(), 6);
    }

    #[test]
    #[should_panic(expected = "stack overflow detected")]
    fn test_corrupted_canary_panics() {
        let pool = StackPool::new();
        let mut stack = pool.allocate(StackSizeClass::Small).unwrap();
        stack.install_canary(STACK_CANARY);

        let mut t = thread("deep");
        t.stack = Some(stack);
        t.check_overflow();

        if let Some(stack) = t.stack_mut() {
            stack.as_mut_slice()[0] = 0x4141_4141;
        }
        t.check_overflow();
    }
}
