//! Cooperative host implementation of [`Arch`].
//!
//! There is no second machine stack on the host. A context switch is
//! bookkeeping only, and control returns to the caller of
//! [`Arch::context_switch`] which from then on acts as the incoming thread.
//! A context that never ran reports [`SwitchPath::FreshStart`] exactly once,
//! so the kernel enters its start routine inline. Interrupts raised on
//! the machine are queued and handed to the idle loop one at a time.
//!
//! Code following a dispatch therefore runs as whichever thread was
//! switched in; callers check `Kernel::current_id` when that matters.

use super::{Arch, InterruptHandler, PendingInterrupt, SwitchPath, UserRegisters};
use crate::kernel::Kernel;

extern crate alloc;
use alloc::collections::VecDeque;

/// Saved context of one thread on the cooperative machine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CooperativeContext {
    started: bool,
    stack_bottom: usize,
    switches_in: u64,
}

impl CooperativeContext {
    /// Whether this context has ever been switched to or away from.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Initial stack pointer recorded by `init_context`.
    pub fn stack_bottom(&self) -> usize {
        self.stack_bottom
    }

    /// Number of times this context was switched in.
    pub fn switches_in(&self) -> u64 {
        self.switches_in
    }
}

/// Single-processor machine simulated on the host.
#[derive(Debug)]
pub struct CooperativeArch {
    interrupts_enabled: bool,
    registers: UserRegisters,
    pending: VecDeque<PendingInterrupt<CooperativeArch>>,
    switches: u64,
}

impl Default for CooperativeArch {
    fn default() -> Self {
        Self::new()
    }
}

impl CooperativeArch {
    /// A machine with interrupts enabled and no pending interrupts.
    pub fn new() -> Self {
        Self {
            interrupts_enabled: true,
            registers: UserRegisters::default(),
            pending: VecDeque::new(),
            switches: 0,
        }
    }

    /// Queue `count` interrupts whose handlers do nothing, letting the idle
    /// loop wait that many times before concluding that no interrupt will
    /// ever arrive.
    pub fn with_pending_interrupts(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.raise_interrupt(spurious, 0);
        }
        self
    }

    /// Queue an interrupt for delivery to the idle loop.
    pub fn raise_interrupt(&mut self, handler: InterruptHandler<Self>, arg: usize) {
        self.pending.push_back(PendingInterrupt { handler, arg });
    }

    /// Interrupts raised and not yet delivered.
    pub fn pending_interrupts(&self) -> usize {
        self.pending.len()
    }

    /// Machine user registers.
    pub fn registers(&self) -> &UserRegisters {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut UserRegisters {
        &mut self.registers
    }

    /// Total context switches performed.
    pub fn switch_count(&self) -> u64 {
        self.switches
    }
}

impl Arch for CooperativeArch {
    type SavedContext = CooperativeContext;

    fn init_context(&mut self, ctx: &mut Self::SavedContext, stack_bottom: usize) {
        *ctx = CooperativeContext {
            started: false,
            stack_bottom,
            switches_in: 0,
        };
    }

    fn context_switch(
        &mut self,
        prev: &mut Self::SavedContext,
        next: &mut Self::SavedContext,
    ) -> SwitchPath {
        debug_assert!(!self.interrupts_enabled, "context switch with interrupts enabled");
        self.switches += 1;
        prev.started = true;
        next.switches_in += 1;
        if next.started {
            SwitchPath::Resumed
        } else {
            next.started = true;
            SwitchPath::FreshStart
        }
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
    }

    fn disable_interrupts(&mut self) {
        self.interrupts_enabled = false;
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    fn save_user_registers(&mut self, regs: &mut UserRegisters) {
        *regs = self.registers;
    }

    fn restore_user_registers(&mut self, regs: &UserRegisters) {
        self.registers = *regs;
    }

    fn idle(&mut self) -> Option<PendingInterrupt<Self>> {
        self.pending.pop_front()
    }
}

fn spurious(_kernel: &mut Kernel<CooperativeArch>, _arg: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_starts_once() {
        let mut arch = CooperativeArch::new();
        let mut boot = CooperativeContext::default();
        let mut fresh = CooperativeContext::default();
        arch.init_context(&mut fresh, 0x8000);
        arch.disable_interrupts();

        assert_eq!(arch.context_switch(&mut boot, &mut fresh), SwitchPath::FreshStart);
        assert_eq!(arch.context_switch(&mut fresh, &mut boot), SwitchPath::Resumed);
        assert_eq!(arch.context_switch(&mut boot, &mut fresh), SwitchPath::Resumed);

        assert_eq!(fresh.switches_in(), 2);
        assert_eq!(fresh.stack_bottom(), 0x8000);
        assert_eq!(arch.switch_count(), 3);
    }

    #[test]
    fn test_user_registers_round_trip_through_machine() {
        let mut arch = CooperativeArch::new();
        arch.registers_mut().0[2] = 17;

        let mut saved = UserRegisters::default();
        arch.save_user_registers(&mut saved);
        arch.registers_mut().0[2] = 0;
        arch.restore_user_registers(&saved);

        assert_eq!(arch.registers().0[2], 17);
    }

    #[test]
    fn test_idle_delivers_interrupts_in_order() {
        let mut arch = CooperativeArch::new().with_pending_interrupts(1);
        arch.raise_interrupt(spurious, 7);
        assert_eq!(arch.pending_interrupts(), 2);

        assert_eq!(arch.idle().map(|irq| irq.arg), Some(0));
        assert_eq!(arch.idle().map(|irq| irq.arg), Some(7));
        assert!(arch.idle().is_none());
    }
}
