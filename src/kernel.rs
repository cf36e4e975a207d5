//! The dispatcher.
//!
//! [`Kernel`] owns every thread, the scheduler, the stack pool and the
//! statistics registry, and implements the thread lifecycle on top of them.
//! There are no globals: whoever drives the machine holds `&mut Kernel`,
//! and thread start routines receive it as their first argument.
//!
//! All scheduler state is touched only with interrupts disabled.
//! [`Kernel::schedule`] is the single place where the processor changes
//! hands; it always ends by running [`Kernel::tail`] in the incoming
//! thread, on both return paths of the context switch.

use crate::arch::{Arch, SwitchPath};
use crate::config::SchedulerConfig;
use crate::errors::{InvalidOperationError, KernelResult, SpawnError};
use crate::mem::{StackPool, StackSizeClass, STACK_CANARY};
use crate::sched::{Prediction, SchedPolicy, Scheduler};
use crate::stats::Statistics;
use crate::thread::{
    Priority, StartRoutine, Thread, ThreadEntry, ThreadId, ThreadStatus, ThreadTable,
    DEFAULT_PRIORITY,
};
use crate::time::{TickMode, IDLE_TICKS};

extern crate alloc;
use alloc::string::String;

/// Main kernel handle that manages the threading system.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
pub struct Kernel<A: Arch> {
    arch: A,
    scheduler: Scheduler,
    threads: ThreadTable<A>,
    stack_pool: StackPool,
    stats: Statistics,
    /// Thread owning the processor
    current: Option<ThreadId>,
    /// Finished thread whose stack may still be in use until the next tail
    to_be_destroyed: Option<ThreadId>,
    max_threads: usize,
    stack_size: StackSizeClass,
    halted: bool,
}

impl<A: Arch> Kernel<A> {
    /// Create a kernel with no threads.
    ///
    /// # Arguments
    ///
    /// * `arch` - Machine the kernel dispatches on
    /// * `config` - Scheduler settings, validated here
    pub fn new(arch: A, config: SchedulerConfig) -> KernelResult<Self> {
        config.validate()?;
        let scheduler = Scheduler::from_config(&config)?;
        log::info!(
            "kernel: policy {}, alpha {}, quantum {}, max threads {}",
            config.policy(),
            config.alpha(),
            config.quantum(),
            config.max_threads()
        );
        Ok(Self {
            arch,
            scheduler,
            threads: ThreadTable::new(),
            stack_pool: StackPool::new(),
            stats: Statistics::new(),
            current: None,
            to_be_destroyed: None,
            max_threads: config.max_threads(),
            stack_size: config.stack_size(),
            halted: false,
        })
    }

    /// Turn the code calling this into the first running thread.
    ///
    /// The bootstrap thread runs on the caller's stack, so it has no stack
    /// of its own and no start routine.
    ///
    /// # Panics
    ///
    /// If a thread is already running.
    pub fn bootstrap(&mut self, name: impl Into<String>) -> ThreadId {
        assert!(self.current.is_none(), "kernel already has a running thread");
        let id = self.threads.insert(name.into(), DEFAULT_PRIORITY);
        let now = self.stats.now();
        let thread = live_mut(&mut self.threads, id);
        thread.status = ThreadStatus::Running;
        thread.curr_cpu_burst_start = now;
        self.current = Some(id);
        log::debug!("bootstrapped thread {}", id);
        id
    }

    pub fn arch(&self) -> &A {
        &self.arch
    }

    pub fn arch_mut(&mut self) -> &mut A {
        &mut self.arch
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn stack_pool(&self) -> &StackPool {
        &self.stack_pool
    }

    pub fn threads(&self) -> &ThreadTable<A> {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread<A>> {
        self.threads.get(id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread<A>> {
        self.threads.get_mut(id)
    }

    /// Thread owning the processor, if the kernel was bootstrapped.
    pub fn current_id(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn current_thread(&self) -> Option<&Thread<A>> {
        self.threads.get(self.current?)
    }

    /// Finished thread waiting for the next tail to destroy it.
    pub fn pending_destruction(&self) -> Option<ThreadId> {
        self.to_be_destroyed
    }

    /// True once the processor found nothing to run and no interrupt could
    /// change that, or after `shutdown`.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Change the scheduling policy.
    pub fn set_policy(&mut self, policy: SchedPolicy) {
        self.scheduler.set_policy(policy);
    }

    /// Run `f` with interrupts disabled, then restore the previous level.
    pub fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_enabled = self.interrupts_off();
        let result = f(self);
        self.restore_interrupts(was_enabled);
        result
    }

    /// Create a thread control block. The thread does not run until forked.
    ///
    /// # Arguments
    ///
    /// * `name` - Debugging name
    /// * `priority` - Static priority, lower runs first
    pub fn create_thread(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
    ) -> Result<ThreadId, SpawnError> {
        if self.threads.len() >= self.max_threads {
            return Err(SpawnError::TooManyThreads);
        }
        let id = self.threads.insert(name.into(), priority);
        log::debug!("created thread {} with priority {}", id, priority);
        Ok(id)
    }

    /// Give a created thread a stack and a start routine, then admit it.
    ///
    /// # Arguments
    ///
    /// * `id` - Thread returned by `create_thread`
    /// * `entry` - Start routine, run the first time the thread is dispatched
    /// * `arg` - Argument handed to `entry`
    pub fn fork(&mut self, id: ThreadId, entry: ThreadEntry<A>, arg: usize) -> Result<(), SpawnError> {
        let thread = self.threads.get_mut(id).ok_or(SpawnError::NoSuchThread(id))?;
        if thread.status != ThreadStatus::JustCreated || thread.stack.is_some() {
            return Err(SpawnError::AlreadyStarted(id));
        }

        let mut stack = self
            .stack_pool
            .allocate(self.stack_size)
            .ok_or(SpawnError::OutOfMemory)?;
        stack.install_canary(STACK_CANARY);
        self.arch.init_context(&mut thread.context, stack.stack_bottom());
        thread.stack = Some(stack);
        thread.start = Some(StartRoutine { entry, arg });
        log::debug!("forking thread {} ({})", thread.name(), id);

        self.without_interrupts(|kernel| {
            kernel.ready_to_run(id);
        });
        Ok(())
    }

    /// Admit `id` to the ready queue.
    ///
    /// # Panics
    ///
    /// If interrupts are enabled, the thread does not exist or it is
    /// already queued.
    pub fn ready_to_run(&mut self, id: ThreadId) -> Option<Prediction> {
        assert!(
            !self.arch.interrupts_enabled(),
            "ready_to_run called with interrupts enabled"
        );
        let now = self.stats.now();
        let thread = live_mut(&mut self.threads, id);
        self.scheduler.ready_to_run(thread, now)
    }

    /// Dequeue the thread that should run next, `None` if nothing is ready.
    ///
    /// # Panics
    ///
    /// If interrupts are enabled.
    pub fn find_next_to_run(&mut self) -> Option<ThreadId> {
        assert!(
            !self.arch.interrupts_enabled(),
            "find_next_to_run called with interrupts enabled"
        );
        self.scheduler.find_next_to_run(&self.threads)
    }

    /// Hand the processor to `next`.
    ///
    /// The caller has already moved the outgoing thread to its new state
    /// (ready, blocked or finished). On return the code runs as the thread
    /// switched in, with its user state restored and any thread pending
    /// destruction gone.
    ///
    /// # Panics
    ///
    /// If interrupts are enabled, no thread is running, `next` is the
    /// running thread, `next` is neither ready nor newly created, `next` is
    /// still queued, or the outgoing thread overflowed its stack.
    pub fn schedule(&mut self, next: ThreadId) {
        assert!(
            !self.arch.interrupts_enabled(),
            "schedule called with interrupts enabled"
        );
        let old = self.current_or_panic();
        assert_ne!(old, next, "schedule to the running thread {}", next);
        let status = self.threads.get(next).map(Thread::status);
        assert!(
            matches!(status, Some(ThreadStatus::Ready | ThreadStatus::JustCreated)),
            "thread {} dispatched while {:?}",
            next,
            status
        );
        assert!(
            !self.scheduler.ready_queue().contains(next),
            "thread {} dispatched while still in the ready queue",
            next
        );
        let now = self.stats.now();

        let outgoing = live_mut(&mut self.threads, old);
        outgoing.save_user_state(&mut self.arch);
        outgoing.check_overflow();

        live_mut(&mut self.threads, next).start_running(now);
        self.current = Some(next);

        log::debug!(
            "switching from {} ({}) to {} ({})",
            self.threads.get(old).map_or("", Thread::name),
            old,
            self.threads.get(next).map_or("", Thread::name),
            next
        );

        let (prev, incoming) = self.threads.pair_mut(old, next);
        let path = self.arch.context_switch(&mut prev.context, &mut incoming.context);
        match path {
            SwitchPath::Resumed => self.tail(),
            SwitchPath::FreshStart => self.thread_root(),
        }
    }

    /// Finish a switch in the incoming thread.
    ///
    /// Destroys the thread that finished before the switch, then puts the
    /// current thread's user registers and address space back on the
    /// machine. Every path into a thread runs this before anything else.
    pub fn tail(&mut self) {
        if let Some(dead) = self.to_be_destroyed.take() {
            self.destroy(dead);
        }
        if let Some(current) = self.current {
            live_mut(&mut self.threads, current).restore_user_state(&mut self.arch);
        }
    }

    /// Give up the processor if another thread is ready.
    ///
    /// # Returns
    ///
    /// `false` if nothing else was ready and the caller kept running.
    pub fn yield_now(&mut self) -> bool {
        let was_enabled = self.interrupts_off();
        let me = self.current_or_panic();
        let next = self.find_next_to_run();
        if let Some(next) = next {
            log::debug!("thread {} yielding to {}", me, next);
            self.end_burst(me);
            self.ready_to_run(me);
            self.schedule(next);
        }
        self.restore_interrupts(was_enabled);
        next.is_some()
    }

    /// Give up the processor for good or until woken.
    ///
    /// The current thread must already be blocked or finished. With nothing
    /// ready the processor idles: each interrupt [`Arch::idle`] delivers is
    /// charged [`IDLE_TICKS`] of idle time and its handler runs, possibly
    /// waking a thread. When no interrupt can ever come, the kernel halts.
    ///
    /// # Panics
    ///
    /// If interrupts are enabled or the current thread is still runnable.
    pub fn sleep(&mut self) {
        assert!(
            !self.arch.interrupts_enabled(),
            "sleep called with interrupts enabled"
        );
        let me = self.current_or_panic();
        let status = self.threads.get(me).map(Thread::status);
        assert!(
            matches!(status, Some(ThreadStatus::Blocked | ThreadStatus::Finished)),
            "thread {} went to sleep while {:?}",
            me,
            status
        );
        self.end_burst(me);

        loop {
            if let Some(next) = self.find_next_to_run() {
                self.schedule(next);
                return;
            }
            let Some(irq) = self.arch.idle() else {
                self.halt();
                return;
            };
            self.stats.advance_ticks(IDLE_TICKS, TickMode::Idle);
            log::trace!("idle: servicing interrupt (arg {})", irq.arg);
            (irq.handler)(self, irq.arg);
        }
    }

    /// Block the current thread until someone calls [`Kernel::wake`].
    pub fn block_current(&mut self) {
        let was_enabled = self.interrupts_off();
        let me = self.current_or_panic();
        log::debug!("blocking thread {}", me);
        live_mut(&mut self.threads, me).status = ThreadStatus::Blocked;
        self.sleep();
        self.restore_interrupts(was_enabled);
    }

    /// Make a blocked thread ready again.
    pub fn wake(&mut self, id: ThreadId) -> KernelResult<()> {
        if self.halted {
            return Err(InvalidOperationError::Halted.into());
        }
        let status = self
            .threads
            .get(id)
            .map(Thread::status)
            .ok_or(InvalidOperationError::NoSuchThread(id))?;
        if status != ThreadStatus::Blocked {
            return Err(InvalidOperationError::NotBlocked(id).into());
        }
        self.without_interrupts(|kernel| {
            kernel.ready_to_run(id);
        });
        Ok(())
    }

    /// End the current thread.
    ///
    /// Its stack is still in use here, so destruction is left to the
    /// [`Kernel::tail`] of whichever thread runs next.
    ///
    /// # Panics
    ///
    /// If another finished thread is still awaiting destruction.
    pub fn finish(&mut self) {
        self.arch.disable_interrupts();
        let me = self.current_or_panic();
        assert!(
            self.to_be_destroyed.is_none(),
            "thread {} finishing while {:?} awaits destruction",
            me,
            self.to_be_destroyed
        );
        log::debug!("finishing thread {}", me);
        live_mut(&mut self.threads, me).status = ThreadStatus::Finished;
        self.to_be_destroyed = Some(me);
        self.sleep();
    }

    /// Timer interrupt hook.
    ///
    /// # Returns
    ///
    /// `true` if the running thread used up its round robin quantum and
    /// another thread was dispatched. With nothing else ready the thread
    /// keeps running and this stays `false`.
    pub fn timer_tick(&mut self) -> bool {
        let quantum = self.scheduler.quantum();
        if self.halted || quantum == 0 || !self.scheduler.policy().is_preemptive() {
            return false;
        }
        let Some(me) = self.current else {
            return false;
        };
        let burst_start = self.threads.get(me).map_or(0, Thread::curr_cpu_burst_start);
        if self.stats.now().saturating_sub(burst_start) < quantum {
            return false;
        }
        log::debug!("quantum expired for thread {}", me);
        self.yield_now()
    }

    /// Log the ready queue.
    pub fn print_ready_list(&self) {
        self.scheduler.print(&self.threads);
    }

    /// Stop the machine and log the statistics report.
    pub fn shutdown(&mut self) {
        self.halted = true;
        log::info!("machine halting");
        let report = alloc::format!("{}", self.stats);
        for line in report.lines() {
            log::info!("{}", line);
        }
    }

    /// Entry of a thread that has never run: tail first, then the start
    /// routine with interrupts on, then finish if the routine returns while
    /// this thread still owns the processor.
    fn thread_root(&mut self) {
        self.tail();
        self.arch.enable_interrupts();

        let me = self.current_or_panic();
        let routine = live_mut(&mut self.threads, me).start.take();
        let StartRoutine { entry, arg } = match routine {
            Some(routine) => routine,
            None => panic!("thread {} started without a start routine", me),
        };
        entry(self, arg);

        if self.current == Some(me) && !self.halted {
            self.finish();
        }
    }

    fn destroy(&mut self, id: ThreadId) {
        assert_ne!(self.current, Some(id), "destroying the running thread {}", id);
        let mut thread = match self.threads.remove(id) {
            Some(thread) => thread,
            None => panic!("thread {} pending destruction does not exist", id),
        };
        assert_eq!(
            thread.status,
            ThreadStatus::Finished,
            "destroying thread {} that has not finished",
            id
        );
        self.stats.record_thread_exit(thread.wait_time_sum);
        if let Some(stack) = thread.stack.take() {
            self.stack_pool.deallocate(stack);
        }
        log::debug!("destroyed thread {} ({})", thread.name(), id);
    }

    fn end_burst(&mut self, id: ThreadId) {
        let now = self.stats.now();
        let burst = live_mut(&mut self.threads, id).end_burst(now);
        self.stats.record_cpu_burst(burst);
    }

    fn halt(&mut self) {
        self.halted = true;
        log::warn!("no threads ready or runnable and no pending interrupts");
    }

    fn current_or_panic(&self) -> ThreadId {
        match self.current {
            Some(id) => id,
            None => panic!("no current thread"),
        }
    }

    fn interrupts_off(&mut self) -> bool {
        let was_enabled = self.arch.interrupts_enabled();
        self.arch.disable_interrupts();
        was_enabled
    }

    fn restore_interrupts(&mut self, was_enabled: bool) {
        if was_enabled {
            self.arch.enable_interrupts();
        } else {
            self.arch.disable_interrupts();
        }
    }
}

fn live_mut<A: Arch>(threads: &mut ThreadTable<A>, id: ThreadId) -> &mut Thread<A> {
    match threads.get_mut(id) {
        Some(thread) => thread,
        None => panic!("thread {} does not exist", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::CooperativeArch;

    fn kernel(config: SchedulerConfig) -> Kernel<CooperativeArch> {
        Kernel::new(CooperativeArch::new(), config).unwrap()
    }

    fn noop(_kernel: &mut Kernel<CooperativeArch>, _arg: usize) {}

    #[test]
    fn test_invalid_config_rejected() {
        let result = Kernel::new(CooperativeArch::new(), SchedulerConfig::new().with_alpha(2.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_bootstrap_runs_caller() {
        let mut k = kernel(SchedulerConfig::new());
        let main = k.bootstrap("main");
        assert_eq!(k.current_id(), Some(main));
        assert_eq!(k.current_thread().unwrap().status(), ThreadStatus::Running);
        assert!(k.current_thread().unwrap().stack().is_none());
    }

    #[test]
    fn test_thread_limit() {
        let mut k = kernel(SchedulerConfig::new().with_max_threads(2));
        k.bootstrap("main");
        k.create_thread("one", 1).unwrap();
        assert_eq!(k.create_thread("two", 1), Err(SpawnError::TooManyThreads));
    }

    #[test]
    fn test_fork_admits_once() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        let t = k.create_thread("worker", DEFAULT_PRIORITY).unwrap();
        k.fork(t, noop, 0).unwrap();

        assert_eq!(k.thread(t).unwrap().status(), ThreadStatus::Ready);
        assert!(k.thread(t).unwrap().stack().unwrap().check_canary(STACK_CANARY));
        assert_eq!(k.fork(t, noop, 0), Err(SpawnError::AlreadyStarted(t)));

        let ghost = ThreadId::new(99).unwrap();
        assert_eq!(k.fork(ghost, noop, 0), Err(SpawnError::NoSuchThread(ghost)));
        assert!(k.arch().interrupts_enabled());
    }

    #[test]
    #[should_panic(expected = "schedule called with interrupts enabled")]
    fn test_schedule_requires_interrupts_off() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        let t = k.create_thread("worker", DEFAULT_PRIORITY).unwrap();
        k.schedule(t);
    }

    #[test]
    #[should_panic(expected = "no current thread")]
    fn test_schedule_without_current_thread() {
        let mut k = kernel(SchedulerConfig::new());
        let t = k.create_thread("worker", DEFAULT_PRIORITY).unwrap();
        k.arch_mut().disable_interrupts();
        k.schedule(t);
    }

    #[test]
    #[should_panic(expected = "ready_to_run called with interrupts enabled")]
    fn test_ready_to_run_requires_interrupts_off() {
        let mut k = kernel(SchedulerConfig::new());
        let t = k.create_thread("worker", DEFAULT_PRIORITY).unwrap();
        k.ready_to_run(t);
    }

    #[test]
    fn test_find_next_on_empty_queue() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        let next = k.without_interrupts(|k| k.find_next_to_run());
        assert_eq!(next, None);
        assert_eq!(k.stats().cpu_burst_count(), 0);
        assert_eq!(k.stats().now(), 0);
    }

    #[test]
    fn test_yield_alone_keeps_running() {
        let mut k = kernel(SchedulerConfig::new());
        let main = k.bootstrap("main");
        k.yield_now();
        assert_eq!(k.current_id(), Some(main));
        assert_eq!(k.arch().switch_count(), 0);
        assert!(k.arch().interrupts_enabled());
    }

    #[test]
    #[should_panic(expected = "dispatched while Some(Blocked)")]
    fn test_schedule_rejects_blocked_thread() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        let t = k.create_thread("sleeper", DEFAULT_PRIORITY).unwrap();
        k.fork(t, noop, 0).unwrap();
        k.arch_mut().disable_interrupts();
        assert_eq!(k.find_next_to_run(), Some(t));
        k.thread_mut(t).unwrap().status = ThreadStatus::Blocked;
        k.schedule(t);
    }

    #[test]
    #[should_panic(expected = "dispatched while still in the ready queue")]
    fn test_schedule_rejects_queued_thread() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        let t = k.create_thread("worker", DEFAULT_PRIORITY).unwrap();
        k.fork(t, noop, 0).unwrap();
        k.arch_mut().disable_interrupts();
        k.schedule(t);
    }

    #[test]
    fn test_yield_alone_reports_no_switch() {
        let mut k = kernel(SchedulerConfig::new());
        k.bootstrap("main");
        assert!(!k.yield_now());
    }

    #[test]
    fn test_wake_rejects_non_blocked() {
        let mut k = kernel(SchedulerConfig::new());
        let main = k.bootstrap("main");
        assert_eq!(
            k.wake(main),
            Err(InvalidOperationError::NotBlocked(main).into())
        );
        let ghost = ThreadId::new(42).unwrap();
        assert_eq!(
            k.wake(ghost),
            Err(InvalidOperationError::NoSuchThread(ghost).into())
        );
    }
}
