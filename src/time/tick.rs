//! Tick counting.

use super::{TickMode, Ticks};
use portable_atomic::{AtomicU64, Ordering};

/// Monotonic tick counters of the simulated machine.
///
/// `total` always equals the sum of the three per-mode buckets. Counters
/// are atomics so the timer and device handlers can advance them through
/// a shared reference.
#[derive(Debug, Default)]
pub struct TickCounter {
    total: AtomicU64,
    idle: AtomicU64,
    system: AtomicU64,
    user: AtomicU64,
}

impl TickCounter {
    /// Create a counter starting at tick zero.
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            idle: AtomicU64::new(0),
            system: AtomicU64::new(0),
            user: AtomicU64::new(0),
        }
    }

    /// Advance the clock.
    ///
    /// # Arguments
    ///
    /// * `ticks` - Number of ticks that elapsed
    /// * `mode` - Bucket the elapsed ticks are charged to
    ///
    /// # Returns
    ///
    /// The total tick count after the advance.
    pub fn advance(&self, ticks: Ticks, mode: TickMode) -> Ticks {
        let bucket = match mode {
            TickMode::Idle => &self.idle,
            TickMode::System => &self.system,
            TickMode::User => &self.user,
        };
        bucket.fetch_add(ticks, Ordering::AcqRel);
        self.total.fetch_add(ticks, Ordering::AcqRel) + ticks
    }

    /// Current time: total ticks since the machine started.
    pub fn now(&self) -> Ticks {
        self.total.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> Ticks {
        self.idle.load(Ordering::Acquire)
    }

    pub fn system(&self) -> Ticks {
        self.system.load(Ordering::Acquire)
    }

    pub fn user(&self) -> Ticks {
        self.user.load(Ordering::Acquire)
    }
}
