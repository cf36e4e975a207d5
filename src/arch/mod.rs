//! Architecture abstraction layer for context switching and interrupt handling.
//!
//! The scheduler never touches registers directly. Everything below the
//! thread abstraction (the raw context switch, the interrupt mask, the
//! simulated machine's user registers) goes through [`Arch`].

use core::fmt;

use crate::kernel::Kernel;

pub mod cooperative;

pub use cooperative::{CooperativeArch, CooperativeContext};

/// Number of user-mode registers saved per thread, including the program
/// counter, stack pointer and the branch delay slots of the simulated CPU.
pub const NUM_TOTAL_REGS: usize = 40;

/// User-mode register file of the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRegisters(pub [i64; NUM_TOTAL_REGS]);

impl Default for UserRegisters {
    fn default() -> Self {
        Self([0; NUM_TOTAL_REGS])
    }
}

/// How control came back from [`Arch::context_switch`].
///
/// A switch "returns" in the context of the incoming thread. A thread that
/// ran before continues right after its own earlier switch call; a thread
/// that never ran has no such call to return to and must begin at its start
/// routine instead. Both paths run the dispatcher tail before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPath {
    /// Incoming thread resumes after its previous switch
    Resumed,
    /// Incoming thread never ran and enters its start routine
    FreshStart,
}

/// Device or timer interrupt handler, run by the kernel with interrupts
/// disabled. Handlers typically call [`Kernel::wake`].
pub type InterruptHandler<A> = fn(&mut Kernel<A>, usize);

/// An interrupt delivered to the idle loop.
pub struct PendingInterrupt<A: Arch> {
    pub handler: InterruptHandler<A>,
    pub arg: usize,
}

impl<A: Arch> fmt::Debug for PendingInterrupt<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInterrupt")
            .field("arg", &self.arg)
            .finish_non_exhaustive()
    }
}

/// Architecture abstraction trait.
///
/// Implemented once per machine. The kernel owns its `Arch` value and calls
/// it only from inside interrupts-disabled critical sections, except for
/// the interrupt mask operations themselves.
pub trait Arch: Sized {
    /// Architecture-specific saved context type.
    ///
    /// Holds whatever callee-saved state the machine needs to resume a
    /// thread, plus enough to tell a never-run context apart.
    type SavedContext: Default;

    /// Prepare `ctx` so the first switch into it reports
    /// [`SwitchPath::FreshStart`] on a stack whose initial pointer is
    /// `stack_bottom`.
    fn init_context(&mut self, ctx: &mut Self::SavedContext, stack_bottom: usize);

    /// Save the running thread into `prev` and continue as `next`.
    ///
    /// Must be called with interrupts disabled.
    fn context_switch(
        &mut self,
        prev: &mut Self::SavedContext,
        next: &mut Self::SavedContext,
    ) -> SwitchPath;

    /// Enable interrupt delivery.
    fn enable_interrupts(&mut self);

    /// Disable interrupt delivery, opening a critical section.
    fn disable_interrupts(&mut self);

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled(&self) -> bool;

    /// Copy the machine's user registers into a thread's save area.
    fn save_user_registers(&mut self, regs: &mut UserRegisters);

    /// Load a thread's saved user registers into the machine.
    fn restore_user_registers(&mut self, regs: &UserRegisters);

    /// Wait for the next interrupt with nothing to run.
    ///
    /// Returns the interrupt to service, whose handler may make threads
    /// ready. `None` means no interrupt can ever arrive again, and the
    /// kernel halts.
    fn idle(&mut self) -> Option<PendingInterrupt<Self>> {
        None
    }
}
