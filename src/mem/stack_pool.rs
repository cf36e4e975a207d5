//! Stack pool allocator for thread stacks.
//!
//! Stacks of destroyed threads go back to a per-size-class free list and
//! are handed out again before any new memory is allocated.

use portable_atomic::{AtomicUsize, Ordering};
use spin::Mutex;

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Value written at the lowest word of every stack.
pub const STACK_CANARY: u64 = 0xDEAD_BEEF_CAFE_BABE;

const WORD_SIZE: usize = core::mem::size_of::<u64>();

/// Stack size classes for the pool allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSizeClass {
    /// Small stack: 4 KiB
    Small = 4096,
    /// Medium stack: 16 KiB
    Medium = 16384,
    /// Large stack: 64 KiB
    Large = 65536,
}

impl StackSizeClass {
    /// Get the size in bytes for this stack class.
    pub fn size(self) -> usize {
        self as usize
    }

    fn index(self) -> usize {
        match self {
            Self::Small => 0,
            Self::Medium => 1,
            Self::Large => 2,
        }
    }
}

/// A thread stack.
///
/// The stack grows down from `stack_bottom()` towards the canary word at
/// index 0.
pub struct Stack {
    words: Box<[u64]>,
    size_class: StackSizeClass,
}

impl Stack {
    fn try_new(size_class: StackSizeClass) -> Option<Self> {
        let len = size_class.size() / WORD_SIZE;
        let mut words = Vec::new();
        words.try_reserve_exact(len).ok()?;
        words.resize(len, 0);
        Some(Self {
            words: words.into_boxed_slice(),
            size_class,
        })
    }

    /// Get the stack size in bytes.
    pub fn size(&self) -> usize {
        self.words.len() * WORD_SIZE
    }

    /// Get the stack size class.
    pub fn size_class(&self) -> StackSizeClass {
        self.size_class
    }

    /// Address one past the highest word, 16-byte aligned down: the
    /// initial stack pointer of a fresh context.
    pub fn stack_bottom(&self) -> usize {
        let base = self.words.as_ptr() as usize;
        (base + self.size()) & !0xF
    }

    /// Raw words of the stack, lowest address first.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// Install a stack canary value for overflow detection.
    ///
    /// # Arguments
    ///
    /// * `canary` - The canary value to write
    pub fn install_canary(&mut self, canary: u64) {
        if let Some(word) = self.words.first_mut() {
            *word = canary;
        }
    }

    /// Check if the stack canary is still intact.
    ///
    /// # Arguments
    ///
    /// * `expected_canary` - The expected canary value
    ///
    /// # Returns
    ///
    /// `true` if the canary is intact, `false` if it has been corrupted.
    pub fn check_canary(&self, expected_canary: u64) -> bool {
        self.words.first() == Some(&expected_canary)
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("size_class", &self.size_class)
            .field("bottom", &format_args!("{:#x}", self.stack_bottom()))
            .finish()
    }
}

/// Pool of reusable thread stacks, one free list per size class.
pub struct StackPool {
    free_stacks: [Mutex<Vec<Stack>>; 3],
    stats: StackPoolStats,
}

#[derive(Debug, Default)]
struct StackPoolStats {
    allocated: AtomicUsize,
    reused: AtomicUsize,
    in_use: AtomicUsize,
}

impl Default for StackPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StackPool {
    pub const fn new() -> Self {
        Self {
            free_stacks: [
                Mutex::new(Vec::new()),
                Mutex::new(Vec::new()),
                Mutex::new(Vec::new()),
            ],
            stats: StackPoolStats {
                allocated: AtomicUsize::new(0),
                reused: AtomicUsize::new(0),
                in_use: AtomicUsize::new(0),
            },
        }
    }

    /// Take a stack of `size_class` from the free list, or allocate one.
    ///
    /// The returned stack is zeroed below the canary slot.
    ///
    /// # Returns
    ///
    /// `None` if no free stack exists and memory is exhausted.
    pub fn allocate(&self, size_class: StackSizeClass) -> Option<Stack> {
        let recycled = self.free_stacks[size_class.index()].lock().pop();
        let stack = match recycled {
            Some(mut stack) => {
                stack.words.fill(0);
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                stack
            }
            None => {
                let stack = Stack::try_new(size_class)?;
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                stack
            }
        };
        self.stats.in_use.fetch_add(1, Ordering::AcqRel);
        Some(stack)
    }

    /// Return a stack to its free list.
    pub fn deallocate(&self, stack: Stack) {
        self.stats.in_use.fetch_sub(1, Ordering::AcqRel);
        self.free_stacks[stack.size_class.index()].lock().push(stack);
    }

    /// Stacks freshly allocated from the heap.
    pub fn allocated(&self) -> usize {
        self.stats.allocated.load(Ordering::Relaxed)
    }

    /// Allocations satisfied from a free list.
    pub fn reused(&self) -> usize {
        self.stats.reused.load(Ordering::Relaxed)
    }

    /// Stacks currently owned by threads.
    pub fn in_use(&self) -> usize {
        self.stats.in_use.load(Ordering::Acquire)
    }
}
