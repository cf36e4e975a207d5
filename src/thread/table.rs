//! Arena of thread control blocks.

use core::num::NonZeroUsize;

use super::{Priority, Thread, ThreadId};
use crate::arch::Arch;

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

/// Owns every live thread. Slot `n` holds the thread with id `n + 1`;
/// slots of destroyed threads stay empty, so ids are never handed out
/// twice.
pub struct ThreadTable<A: Arch> {
    slots: Vec<Option<Thread<A>>>,
    live: usize,
}

impl<A: Arch> Default for ThreadTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> ThreadTable<A> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Create a thread in a fresh slot.
    ///
    /// # Returns
    ///
    /// The id of the new thread.
    pub fn insert(&mut self, name: String, priority: Priority) -> ThreadId {
        let id = ThreadId(NonZeroUsize::MIN.saturating_add(self.slots.len()));
        self.slots.push(Some(Thread::new(id, name, priority)));
        self.live += 1;
        id
    }

    /// Remove a thread from the arena, handing ownership to the caller.
    pub fn remove(&mut self, id: ThreadId) -> Option<Thread<A>> {
        let thread = self.slots.get_mut(id.get() - 1)?.take()?;
        self.live -= 1;
        Some(thread)
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread<A>> {
        self.slots.get(id.get() - 1)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread<A>> {
        self.slots.get_mut(id.get() - 1)?.as_mut()
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.get(id).is_some()
    }

    /// Mutable access to two distinct threads at once.
    ///
    /// # Panics
    ///
    /// If `a == b` or either thread does not exist.
    pub fn pair_mut(&mut self, a: ThreadId, b: ThreadId) -> (&mut Thread<A>, &mut Thread<A>) {
        assert_ne!(a, b, "pair_mut on a single thread");
        let (ia, ib) = (a.get() - 1, b.get() - 1);
        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        match (first.as_mut(), second.as_mut()) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => panic!("pair_mut on missing thread ({} or {})", a, b),
        }
    }

    /// Number of live threads.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live threads in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Thread<A>> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
