//! User address spaces as seen by the dispatcher.
//!
//! Loading programs and translating addresses live elsewhere. The
//! dispatcher only needs to park and reinstall per-space machine state
//! around a context switch.

/// A user program's address space.
pub trait AddressSpace {
    /// Called on the outgoing thread before it is switched out.
    fn save_state_on_switch(&mut self);

    /// Called on the incoming thread once it is running again.
    fn restore_state_on_switch(&mut self);
}
