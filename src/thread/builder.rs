use super::{Priority, ThreadEntry, ThreadId, DEFAULT_PRIORITY};
use crate::arch::Arch;
use crate::errors::SpawnError;
use crate::kernel::Kernel;

extern crate alloc;
use alloc::string::String;

/// Creates and forks a thread in one step.
pub struct ThreadBuilder {
    priority: Priority,
    name: Option<String>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            name: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Create the thread and admit it to the ready queue.
    ///
    /// # Arguments
    ///
    /// * `kernel` - Kernel that will own the thread
    /// * `entry` - Start routine run on first dispatch
    /// * `arg` - Argument passed to `entry`
    pub fn spawn<A: Arch>(
        self,
        kernel: &mut Kernel<A>,
        entry: ThreadEntry<A>,
        arg: usize,
    ) -> Result<ThreadId, SpawnError> {
        let name = self.name.unwrap_or_else(|| String::from("forked thread"));
        let id = kernel.create_thread(name, self.priority)?;
        kernel.fork(id, entry, arg)?;
        Ok(id)
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
