//! Simulated time.
//!
//! Time is measured in ticks of the simulated machine clock. The timer
//! collaborator advances the clock; the scheduler only reads it to stamp
//! wait and burst boundaries.

pub mod tick;

pub use tick::TickCounter;

/// A count of simulated clock ticks.
pub type Ticks = u64;

/// Which bucket an advance of the clock is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Processor had nothing to run
    Idle,
    /// Kernel code was executing
    System,
    /// User program instructions were executing
    User,
}

/// Ticks charged for one pass of the idle loop when the processor waits
/// for the next interrupt.
pub const IDLE_TICKS: Ticks = 10;
