//! Ordered container of threads waiting for the processor.

use core::fmt;

use crate::thread::ThreadId;

extern crate alloc;
use alloc::collections::VecDeque;

/// One ready-queue slot: a thread and the key it was inserted with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadyEntry {
    pub thread: ThreadId,
    /// Sort key, `None` for entries added with `append`
    pub key: Option<f64>,
}

impl ReadyEntry {
    /// Key used when ordering; appended entries sort as 0.
    pub fn sort_key(&self) -> f64 {
        self.key.unwrap_or(0.0)
    }
}

/// FIFO queue of ready threads that also supports keyed insertion.
///
/// A thread appears at most once. Sorted insertion is stable: a new entry
/// goes after every entry whose key is less than or equal to its own.
#[derive(Debug, Default, Clone)]
pub struct ReadyQueue {
    entries: VecDeque<ReadyEntry>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Add `thread` at the tail.
    ///
    /// # Panics
    ///
    /// If `thread` is already queued.
    pub fn append(&mut self, thread: ThreadId) {
        self.assert_absent(thread);
        self.entries.push_back(ReadyEntry { thread, key: None });
    }

    /// Insert `thread` in ascending `key` order, after all equal keys.
    ///
    /// # Panics
    ///
    /// If `thread` is already queued.
    pub fn sorted_insert(&mut self, thread: ThreadId, key: f64) {
        self.assert_absent(thread);
        let entry = ReadyEntry {
            thread,
            key: Some(key),
        };
        match self.entries.iter().position(|e| e.sort_key() > key) {
            Some(index) => self.entries.insert(index, entry),
            None => self.entries.push_back(entry),
        }
    }

    /// Take the head of the queue. `None` when nothing is ready.
    pub fn remove(&mut self) -> Option<ThreadId> {
        self.entries.pop_front().map(|e| e.thread)
    }

    /// Remove `thread` wherever it sits.
    ///
    /// # Returns
    ///
    /// `false` if it was not queued.
    pub fn remove_by_identity(&mut self, thread: ThreadId) -> bool {
        match self.entries.iter().position(|e| e.thread == thread) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the entry with the smallest `key(thread)`.
    ///
    /// Among equal minima the one nearest the head wins. Exactly that entry
    /// is removed; the order of the rest is unchanged.
    pub fn take_min_by_key<K, F>(&mut self, mut key: F) -> Option<ThreadId>
    where
        K: PartialOrd,
        F: FnMut(ThreadId) -> K,
    {
        let mut best: Option<(usize, K)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let k = key(entry.thread);
            let better = match &best {
                Some((_, min)) => k < *min,
                None => true,
            };
            if better {
                best = Some((index, k));
            }
        }
        let (index, _) = best?;
        self.entries.remove(index).map(|e| e.thread)
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.entries.iter().any(|e| e.thread == thread)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &ReadyEntry> {
        self.entries.iter()
    }

    /// Thread ids from head to tail.
    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.entries.iter().map(|e| e.thread)
    }

    fn assert_absent(&self, thread: ThreadId) {
        assert!(
            !self.contains(thread),
            "thread {} is already in the ready queue",
            thread
        );
    }
}

impl fmt::Display for ReadyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match entry.key {
                Some(key) => write!(f, "{}@{}", entry.thread, key)?,
                None => write!(f, "{}", entry.thread)?,
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    fn id(n: usize) -> ThreadId {
        ThreadId::new(n).unwrap()
    }

    fn drain(queue: &mut ReadyQueue) -> Vec<usize> {
        core::iter::from_fn(|| queue.remove()).map(ThreadId::get).collect()
    }

    #[test]
    fn test_append_is_fifo() {
        let mut queue = ReadyQueue::new();
        for n in [1, 2, 3] {
            queue.append(id(n));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(drain(&mut queue), [1, 2, 3]);
        assert_eq!(queue.remove(), None);
    }

    #[test]
    fn test_sorted_insert_is_stable() {
        let mut queue = ReadyQueue::new();
        queue.sorted_insert(id(1), 50.0);
        queue.sorted_insert(id(2), 10.0);
        queue.sorted_insert(id(3), 10.0);
        queue.sorted_insert(id(4), 30.0);
        assert_eq!(drain(&mut queue), [2, 3, 4, 1]);
    }

    #[test]
    fn test_appended_entries_sort_as_zero() {
        let mut queue = ReadyQueue::new();
        queue.sorted_insert(id(1), 7.0);
        queue.append(id(2));
        queue.sorted_insert(id(3), 0.0);
        queue.sorted_insert(id(4), -1.0);
        assert_eq!(queue.to_string(), "[4@-1, 3@0, 1@7, 2]");
    }

    #[test]
    fn test_remove_by_identity() {
        let mut queue = ReadyQueue::new();
        for n in [1, 2, 3] {
            queue.append(id(n));
        }
        assert!(queue.remove_by_identity(id(2)));
        assert!(!queue.remove_by_identity(id(2)));
        assert!(!queue.contains(id(2)));
        assert_eq!(drain(&mut queue), [1, 3]);
    }

    #[test]
    fn test_take_min_prefers_earliest() {
        let mut queue = ReadyQueue::new();
        for n in [1, 2, 3, 4] {
            queue.append(id(n));
        }
        let priority = |t: ThreadId| [50, 10, 10, 30][t.get() - 1];

        assert_eq!(queue.take_min_by_key(priority), Some(id(2)));
        assert_eq!(queue.take_min_by_key(priority), Some(id(3)));
        assert_eq!(queue.take_min_by_key(priority), Some(id(4)));
        assert_eq!(queue.take_min_by_key(priority), Some(id(1)));
        assert_eq!(queue.take_min_by_key(priority), None);
    }

    #[test]
    fn test_take_min_of_tail_keeps_queue_usable() {
        let mut queue = ReadyQueue::new();
        queue.append(id(1));
        queue.append(id(2));
        assert_eq!(queue.take_min_by_key(|t| -(t.get() as i64)), Some(id(2)));
        queue.append(id(3));
        assert_eq!(drain(&mut queue), [1, 3]);
    }

    #[test]
    #[should_panic(expected = "already in the ready queue")]
    fn test_duplicate_insert_panics() {
        let mut queue = ReadyQueue::new();
        queue.append(id(1));
        queue.sorted_insert(id(1), 3.0);
    }
}
