use crate::error::PoolError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// A scoped allocator for one primitive invocation's temporary data.
///
/// Every allocation made through an `Arena` is owned by it; dropping the
/// arena drops them all in one operation. The engine acquires one per
/// primitive dispatch and releases it on return — content too large for a
/// pooled slot also lands here rather than falling back to an ad hoc
/// allocation.
pub struct Arena {
    id: u64,
    limit: usize,
    used: Mutex<usize>,
    owned_bytes: Mutex<Vec<Box<[u8]>>>,
    owned_json: Mutex<Vec<Box<serde_json::Value>>>,
}

impl Arena {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            limit,
            used: Mutex::new(0),
            owned_bytes: Mutex::new(Vec::new()),
            owned_json: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes_used(&self) -> usize {
        *self.used.lock()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Allocates and takes ownership of `len` bytes, initialized from
    /// `source` (truncated/zero-padded is not performed: `source.len()`
    /// must equal `len`, enforced by the caller passing an owned buffer).
    pub fn alloc_bytes(&self, source: Vec<u8>) -> Result<ArenaBytes<'_>, PoolError> {
        let mut used = self.used.lock();
        let next = *used + source.len();
        if next > self.limit {
            return Err(PoolError::ArenaLimitExceeded {
                arena: "request-scoped",
                requested: source.len(),
                limit: self.limit,
            });
        }
        *used = next;
        drop(used);
        let boxed: Box<[u8]> = source.into_boxed_slice();
        // `Box`'s heap allocation has a stable address independent of the
        // owning `Vec`'s own growth, so the reference handed back stays
        // valid for as long as the arena (and thus the Vec entry) lives.
        let ptr: *const [u8] = &*boxed;
        self.owned_bytes.lock().push(boxed);
        let slice: &[u8] = unsafe { &*ptr };
        Ok(ArenaBytes { slice })
    }

    /// Stashes a JSON-like value for the arena's lifetime and hands back a
    /// stable reference, used for per-request parameter/result staging.
    pub fn alloc_json(&self, value: serde_json::Value) -> ArenaJson<'_> {
        let boxed = Box::new(value);
        let ptr: *const serde_json::Value = &*boxed;
        self.owned_json.lock().push(boxed);
        let value_ref: &serde_json::Value = unsafe { &*ptr };
        ArenaJson { value: value_ref }
    }
}

/// A byte slice owned by an [`Arena`]; valid for the arena's lifetime.
pub struct ArenaBytes<'a> {
    slice: &'a [u8],
}

impl<'a> ArenaBytes<'a> {
    pub fn as_slice(&self) -> &'a [u8] {
        self.slice
    }
}

/// A JSON value owned by an [`Arena`]; valid for the arena's lifetime.
pub struct ArenaJson<'a> {
    value: &'a serde_json::Value,
}

impl<'a> ArenaJson<'a> {
    pub fn get(&self) -> &'a serde_json::Value {
        self.value
    }
}
