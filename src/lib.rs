#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! CPU scheduling and dispatch core for a single-processor teaching kernel.
//!
//! The crate keeps the ready queue, picks the next thread under one of
//! several policies, and performs the dispatch that hands the processor
//! from one thread to another. Register-level switching and the interrupt
//! mask are behind the [`Arch`] trait; user address spaces are behind
//! [`AddressSpace`].
//!
//! # Policies
//!
//! - FIFO
//! - static priority (sorted ready queue)
//! - shortest job first, predicting bursts with an exponentially weighted
//!   moving average
//! - round robin with a timer quantum
//! - priority by minimum scan at selection time
//!
//! # Quick Start
//!
//! ```
//! use sched_dispatch::{CooperativeArch, Kernel, SchedPolicy, SchedulerConfig};
//!
//! fn worker(kernel: &mut Kernel<CooperativeArch>, arg: usize) {
//!     kernel.stats().advance_ticks(arg as u64, sched_dispatch::TickMode::User);
//! }
//!
//! let config = SchedulerConfig::new().with_policy(SchedPolicy::ShortestJobFirst);
//! let mut kernel = Kernel::new(CooperativeArch::new(), config).unwrap();
//! kernel.bootstrap("main");
//!
//! let t = kernel.create_thread("worker", 100).unwrap();
//! kernel.fork(t, worker, 5).unwrap();
//! kernel.yield_now();
//!
//! assert_eq!(kernel.stats().thread_count(), 1);
//! ```

pub mod addrspace;
pub mod arch;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod stats;
pub mod thread;
pub mod time;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

extern crate alloc;

// ============================================================================
// Public API
// ============================================================================

pub use addrspace::AddressSpace;
pub use arch::{Arch, CooperativeArch, InterruptHandler, PendingInterrupt, SwitchPath, UserRegisters};
pub use config::SchedulerConfig;
pub use kernel::Kernel;
pub use sched::{BurstPredictor, Prediction, ReadyQueue, SchedPolicy, Scheduler};
pub use stats::Statistics;
pub use thread::{Priority, Thread, ThreadBuilder, ThreadId, ThreadStatus, ThreadTable};
pub use mem::{Stack, StackPool, StackSizeClass};
pub use time::{TickMode, Ticks};
pub use errors::{ConfigError, InvalidOperationError, KernelError, KernelResult, SpawnError};
