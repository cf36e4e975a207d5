//! Error handling for the scheduling and dispatch core.
//!
//! Only misuse of the outer API is reported through these types. Broken
//! scheduler invariants (no current thread, a corrupted stack, dispatch
//! with interrupts enabled) are fatal and panic instead.

#![allow(clippy::uninlined_format_args)]

use core::fmt;
extern crate alloc;
use alloc::string::String;

use crate::thread::ThreadId;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type for kernel operations.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Configuration was rejected
    Config(ConfigError),
    /// Thread creation or forking failed
    Spawn(SpawnError),
    /// Operation does not apply to the thread's current state
    InvalidOperation(InvalidOperationError),
}

/// Errors produced while building or parsing scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Smoothing factor outside `(0, 1]`
    InvalidAlpha(f64),
    /// Policy name not recognised
    UnknownPolicy(String),
    /// Numeric policy code not recognised
    UnknownPolicyCode(i64),
    /// Thread limit of zero
    InvalidThreadLimit(usize),
}

/// Errors that can occur while creating or forking a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// Out of memory for stack allocation
    OutOfMemory,
    /// Maximum number of threads reached
    TooManyThreads,
    /// No thread with this id exists
    NoSuchThread(ThreadId),
    /// Thread was already forked
    AlreadyStarted(ThreadId),
}

/// Invalid operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidOperationError {
    /// No thread with this id exists
    NoSuchThread(ThreadId),
    /// Wake-up of a thread that is not blocked
    NotBlocked(ThreadId),
    /// Kernel has halted; nothing can be dispatched any more
    Halted,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Config(e) => write!(f, "Configuration error: {}", e),
            KernelError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            KernelError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAlpha(alpha) => {
                write!(f, "Smoothing factor must be in (0, 1], got {}", alpha)
            }
            ConfigError::UnknownPolicy(name) => write!(f, "Unknown scheduling policy: {}", name),
            ConfigError::UnknownPolicyCode(code) => {
                write!(f, "Unknown scheduling policy code: {}", code)
            }
            ConfigError::InvalidThreadLimit(limit) => write!(f, "Invalid thread limit: {}", limit),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::OutOfMemory => write!(f, "Out of memory for thread stack"),
            SpawnError::TooManyThreads => write!(f, "Maximum number of threads reached"),
            SpawnError::NoSuchThread(id) => write!(f, "No such thread: {}", id),
            SpawnError::AlreadyStarted(id) => write!(f, "Thread {} was already forked", id),
        }
    }
}

impl fmt::Display for InvalidOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidOperationError::NoSuchThread(id) => write!(f, "No such thread: {}", id),
            InvalidOperationError::NotBlocked(id) => write!(f, "Thread {} is not blocked", id),
            InvalidOperationError::Halted => write!(f, "Kernel has halted"),
        }
    }
}

impl From<ConfigError> for KernelError {
    fn from(error: ConfigError) -> Self {
        KernelError::Config(error)
    }
}

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

impl From<InvalidOperationError> for KernelError {
    fn from(error: InvalidOperationError) -> Self {
        KernelError::InvalidOperation(error)
    }
}
