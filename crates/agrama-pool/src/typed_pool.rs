use crate::error::{fatal, PoolError};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handle into a [`TypedPool`]. Cheap, `Copy`, carries no borrow on the
/// pool — release is always an explicit call via `release_typed`, never
/// implicit on drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(pub u32);

/// Fixed-capacity free-list pool over a single shape `T`.
///
/// Segregating allocations by shape (request buffers, response buffers,
/// JSON objects, vector blocks) keeps each pool's slot size uniform so
/// acquire/release stay O(1) and never touch the global allocator.
pub struct TypedPool<T> {
    name: &'static str,
    capacity: usize,
    slots: Box<[Mutex<T>]>,
    in_use: Box<[AtomicBool]>,
    free: ArrayQueue<u32>,
}

impl<T: Default> TypedPool<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        let mut in_use = Vec::with_capacity(capacity);
        let free = ArrayQueue::new(capacity.max(1));
        for i in 0..capacity {
            slots.push(Mutex::new(T::default()));
            in_use.push(AtomicBool::new(false));
            // capacity == 0 pools are legal (feature disabled); free stays empty.
            let _ = free.push(i as u32);
        }
        Self {
            name,
            capacity,
            slots: slots.into_boxed_slice(),
            in_use: in_use.into_boxed_slice(),
            free,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.capacity - self.free_count()
    }

    /// Obtains a slot, or `Exhausted` if every slot is currently checked out.
    pub fn acquire(&self) -> Result<PoolHandle, PoolError> {
        match self.free.pop() {
            Some(idx) => {
                let was_free = !self.in_use[idx as usize].swap(true, Ordering::AcqRel);
                if !was_free {
                    fatal(format!(
                        "pool '{}' handle {idx} was popped from the free list while already marked in-use",
                        self.name
                    ));
                }
                Ok(PoolHandle(idx))
            }
            None => Err(PoolError::Exhausted { pool: self.name }),
        }
    }

    /// Returns a slot to the pool. Releasing a handle that is not currently
    /// checked out is a fatal invariant violation (double release), not a
    /// recoverable error.
    pub fn release(&self, handle: PoolHandle) {
        let idx = handle.0 as usize;
        if idx >= self.slots.len() {
            fatal(format!(
                "pool '{}' release of out-of-range handle {}",
                self.name, handle.0
            ));
        }
        let was_in_use = self.in_use[idx].swap(false, Ordering::AcqRel);
        if !was_in_use {
            fatal(PoolError::DoubleRelease {
                pool: self.name,
                handle: handle.0,
            });
        }
        // Reset to a clean default so the next acquirer never observes a
        // prior tenant's data.
        *self.slots[idx].lock() = T::default();
        if self.free.push(handle.0).is_err() {
            fatal(format!(
                "pool '{}' free list overflowed on release of handle {}",
                self.name, handle.0
            ));
        }
    }

    /// Runs `f` against the slot's contents while it is checked out.
    pub fn with<R>(&self, handle: PoolHandle, f: impl FnOnce(&mut T) -> R) -> R {
        let idx = handle.0 as usize;
        let mut guard = self.slots[idx].lock();
        f(&mut guard)
    }
}
