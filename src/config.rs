//! Kernel configuration.

use crate::errors::ConfigError;
use crate::mem::StackSizeClass;
use crate::sched::predictor::{validate_alpha, BurstPredictor, DEFAULT_ALPHA};
use crate::sched::SchedPolicy;
use crate::time::Ticks;

/// Default cap on simultaneously live threads.
pub const DEFAULT_MAX_THREADS: usize = 1000;

/// Scheduler and thread settings, built up with chained `with_*` calls.
///
/// ```
/// use sched_dispatch::{SchedPolicy, SchedulerConfig};
///
/// let config = SchedulerConfig::new()
///     .with_policy(SchedPolicy::ShortestJobFirst)
///     .with_alpha(0.25);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    policy: SchedPolicy,
    alpha: f64,
    quantum: Ticks,
    max_threads: usize,
    stack_size: StackSizeClass,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerConfig {
    /// FIFO, alpha 0.5, no quantum, medium stacks.
    pub fn new() -> Self {
        Self {
            policy: SchedPolicy::Fifo,
            alpha: DEFAULT_ALPHA,
            quantum: 0,
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: StackSizeClass::Medium,
        }
    }

    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select the policy by legacy numeric code.
    pub fn with_policy_code(self, code: i64) -> Result<Self, ConfigError> {
        Ok(self.with_policy(SchedPolicy::from_code(code)?))
    }

    /// SJF smoothing factor, in `(0, 1]`.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Round robin time slice in ticks. 0 disables preemption.
    pub fn with_quantum(mut self, quantum: Ticks) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_stack_size(mut self, size: StackSizeClass) -> Self {
        self.stack_size = size;
        self
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_alpha(self.alpha)?;
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidThreadLimit(0));
        }
        Ok(())
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn quantum(&self) -> Ticks {
        self.quantum
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn stack_size(&self) -> StackSizeClass {
        self.stack_size
    }

    /// Predictor built from the configured alpha.
    pub fn predictor(&self) -> Result<BurstPredictor, ConfigError> {
        BurstPredictor::new(self.alpha)
    }
}
