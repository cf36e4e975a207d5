//! Thread scheduler.
//!
//! The [`Scheduler`] decides which ready thread runs next. It never
//! switches contexts itself; [`crate::kernel::Kernel::schedule`] does that
//! with the thread chosen here. Callers hold interrupts disabled for every
//! call, which is the only mutual exclusion the ready queue needs on a
//! single processor.

pub mod policy;
pub mod predictor;
pub mod ready_queue;

pub use policy::SchedPolicy;
pub use predictor::{BurstPredictor, Prediction, DEFAULT_ALPHA};
pub use ready_queue::{ReadyEntry, ReadyQueue};

use crate::arch::Arch;
use crate::config::SchedulerConfig;
use crate::errors::ConfigError;
use crate::thread::{Priority, Thread, ThreadId, ThreadStatus, ThreadTable};
use crate::time::Ticks;

/// Ready queue plus the policy that orders it.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: SchedPolicy,
    predictor: BurstPredictor,
    quantum: Ticks,
    ready: ReadyQueue,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedPolicy::default(), BurstPredictor::default(), 0)
    }
}

impl Scheduler {
    /// Create a scheduler with an empty ready queue.
    ///
    /// # Arguments
    ///
    /// * `policy` - Admission and selection policy
    /// * `predictor` - Burst predictor used under SJF
    /// * `quantum` - Round robin time slice in ticks, 0 for none
    pub fn new(policy: SchedPolicy, predictor: BurstPredictor, quantum: Ticks) -> Self {
        Self {
            policy,
            predictor,
            quantum,
            ready: ReadyQueue::new(),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.policy(), config.predictor()?, config.quantum()))
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Switch policy. Threads already queued keep their positions.
    pub fn set_policy(&mut self, policy: SchedPolicy) {
        log::info!("scheduling policy {} -> {}", self.policy, policy);
        self.policy = policy;
    }

    pub fn predictor(&self) -> BurstPredictor {
        self.predictor
    }

    pub fn quantum(&self) -> Ticks {
        self.quantum
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    /// Mark `thread` ready and queue it according to the policy.
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread being admitted; must not already be queued
    /// * `now` - Current time, starts the thread's wait
    ///
    /// # Returns
    ///
    /// The burst prediction made for it, under SJF with burst history.
    pub fn ready_to_run<A: Arch>(&mut self, thread: &mut Thread<A>, now: Ticks) -> Option<Prediction> {
        log::debug!("putting thread {} ({}) on ready list", thread.name(), thread.id());

        thread.status = ThreadStatus::Ready;
        thread.curr_wait_start = now;

        match self.policy {
            SchedPolicy::ShortestJobFirst if thread.prev_cpu_burst > 0 => {
                let prediction = self
                    .predictor
                    .predict(thread.prev_cpu_burst, thread.prev_expected_cpu_burst);
                log::trace!(
                    "thread {}: burst {} predicted {:.3} error {:.3}",
                    thread.id(),
                    thread.prev_cpu_burst,
                    prediction.expected,
                    prediction.error
                );
                thread.prev_expected_cpu_burst = prediction.expected;
                self.ready.sorted_insert(thread.id(), prediction.expected);
                Some(prediction)
            }
            SchedPolicy::Priority => {
                self.ready.sorted_insert(thread.id(), f64::from(thread.priority()));
                None
            }
            _ => {
                self.ready.append(thread.id());
                None
            }
        }
    }

    /// Dequeue the next thread to run.
    ///
    /// # Returns
    ///
    /// `None` if the ready queue is empty; nothing is changed then.
    pub fn find_next_to_run<A: Arch>(&mut self, threads: &ThreadTable<A>) -> Option<ThreadId> {
        let next = match self.policy {
            SchedPolicy::PriorityMinimumScan => self.ready.take_min_by_key(|id| {
                threads.get(id).map_or(Priority::MAX, Thread::priority)
            }),
            _ => self.ready.remove(),
        }?;

        let status = threads.get(next).map(Thread::status);
        assert_eq!(
            status,
            Some(ThreadStatus::Ready),
            "thread {} selected from the ready queue is not ready",
            next
        );
        Some(next)
    }

    /// Log the ready queue, head first.
    pub fn print<A: Arch>(&self, threads: &ThreadTable<A>) {
        log::info!("Ready list contents:");
        for id in self.ready.threads() {
            let name = threads.get(id).map_or("<destroyed>", Thread::name);
            log::info!("  {} ({})", name, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::CooperativeArch;
    use alloc::string::String;
    use alloc::vec::Vec;

    type Table = ThreadTable<CooperativeArch>;

    fn spawn(table: &mut Table, priority: Priority) -> ThreadId {
        table.insert(String::from("t"), priority)
    }

    fn admit(sched: &mut Scheduler, table: &mut Table, id: ThreadId, now: Ticks) -> Option<Prediction> {
        let thread = table.get_mut(id).unwrap();
        sched.ready_to_run(thread, now)
    }

    fn drain(sched: &mut Scheduler, table: &Table) -> Vec<ThreadId> {
        core::iter::from_fn(|| sched.find_next_to_run(table)).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut table = Table::new();
        let mut sched = Scheduler::default();
        let ids: Vec<_> = (0..3).map(|_| spawn(&mut table, 100)).collect();
        for &id in &ids {
            admit(&mut sched, &mut table, id, 0);
        }
        assert_eq!(drain(&mut sched, &table), ids);
    }

    #[test]
    fn test_ready_to_run_stamps_wait_start() {
        let mut table = Table::new();
        let mut sched = Scheduler::default();
        let id = spawn(&mut table, 100);
        admit(&mut sched, &mut table, id, 42);

        let thread = table.get(id).unwrap();
        assert_eq!(thread.status(), ThreadStatus::Ready);
        assert_eq!(thread.curr_wait_start, 42);
        assert!(sched.ready_queue().contains(id));
    }

    #[test]
    fn test_sjf_orders_by_prediction() {
        let mut table = Table::new();
        let mut sched = Scheduler::new(SchedPolicy::ShortestJobFirst, BurstPredictor::default(), 0);
        let ids: Vec<_> = [7, 3, 5]
            .iter()
            .map(|&burst| {
                let id = spawn(&mut table, 100);
                table.get_mut(id).unwrap().prev_cpu_burst = burst;
                id
            })
            .collect();
        for &id in &ids {
            admit(&mut sched, &mut table, id, 0);
        }
        assert_eq!(drain(&mut sched, &table), [ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_sjf_prediction_updates_history() {
        let mut table = Table::new();
        let mut sched = Scheduler::new(SchedPolicy::ShortestJobFirst, BurstPredictor::default(), 0);
        let id = spawn(&mut table, 100);
        {
            let thread = table.get_mut(id).unwrap();
            thread.prev_cpu_burst = 6;
            thread.prev_expected_cpu_burst = 4.0;
        }

        let prediction = admit(&mut sched, &mut table, id, 0).unwrap();
        assert_eq!(prediction.expected, 5.0);
        assert_eq!(prediction.error, 1.0);
        assert_eq!(table.get(id).unwrap().prev_expected_cpu_burst(), 5.0);
    }

    #[test]
    fn test_sjf_without_history_appends() {
        let mut table = Table::new();
        let mut sched = Scheduler::new(SchedPolicy::ShortestJobFirst, BurstPredictor::default(), 0);
        let seasoned = spawn(&mut table, 100);
        table.get_mut(seasoned).unwrap().prev_cpu_burst = 2;
        let fresh = spawn(&mut table, 100);

        admit(&mut sched, &mut table, seasoned, 0);
        assert_eq!(admit(&mut sched, &mut table, fresh, 0), None);
        assert_eq!(sched.ready_queue().iter().last().unwrap().key, None);
        assert_eq!(drain(&mut sched, &table), [seasoned, fresh]);
    }

    #[test]
    fn test_priority_policies_agree() {
        let priorities = [50, 10, 10, 30];
        for policy in [SchedPolicy::Priority, SchedPolicy::PriorityMinimumScan] {
            let mut table = Table::new();
            let mut sched = Scheduler::new(policy, BurstPredictor::default(), 0);
            let ids: Vec<_> = priorities.iter().map(|&p| spawn(&mut table, p)).collect();
            for &id in &ids {
                admit(&mut sched, &mut table, id, 0);
            }
            assert_eq!(
                drain(&mut sched, &table),
                [ids[1], ids[2], ids[3], ids[0]],
                "policy {}",
                policy
            );
        }
    }

    #[test]
    fn test_empty_queue_changes_nothing() {
        let table = Table::new();
        let mut sched = Scheduler::default();
        assert_eq!(sched.find_next_to_run(&table), None);
        assert!(sched.ready_queue().is_empty());
    }

    #[test]
    #[should_panic(expected = "is not ready")]
    fn test_selecting_non_ready_thread_panics() {
        let mut table = Table::new();
        let mut sched = Scheduler::default();
        let id = spawn(&mut table, 100);
        admit(&mut sched, &mut table, id, 0);
        table.get_mut(id).unwrap().status = ThreadStatus::Blocked;
        sched.find_next_to_run(&table);
    }

    #[test]
    #[should_panic(expected = "already in the ready queue")]
    fn test_double_admission_panics() {
        let mut table = Table::new();
        let mut sched = Scheduler::default();
        let id = spawn(&mut table, 100);
        admit(&mut sched, &mut table, id, 0);
        admit(&mut sched, &mut table, id, 1);
    }
}
