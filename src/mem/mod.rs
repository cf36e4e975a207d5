//! Memory management for thread stacks.
//!
//! Stacks carry a canary word at their lowest address. The dispatcher
//! checks it every time a thread is switched out, turning a silent stack
//! overflow into an immediate fatal error.

pub mod stack_pool;

pub use stack_pool::{Stack, StackPool, StackSizeClass, STACK_CANARY};
