use crate::arena::Arena;
use crate::blocks::{FixedBuffer, VectorBlock, REQUEST_BUFFER_SIZE, RESPONSE_BUFFER_SIZE};
use crate::error::PoolError;
use crate::typed_pool::{PoolHandle, TypedPool};
use serde_json::Value as JsonValue;

/// Per-pool capacity configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolSizes {
    pub request_buffers: usize,
    pub response_buffers: usize,
    pub json_objects: usize,
    pub vector_blocks: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            request_buffers: 256,
            response_buffers: 256,
            json_objects: 512,
            vector_blocks: 256,
        }
    }
}

/// Owns the four mandatory shape-segregated pools plus the per-request
/// arena size default. One `PoolManager` is created per `Core` instance
/// and held behind an `Arc` by every backend that needs bounded-latency
/// scratch space — there is no other module-level mutable state.
pub struct PoolManager {
    request_buffers: TypedPool<FixedBuffer<REQUEST_BUFFER_SIZE>>,
    response_buffers: TypedPool<FixedBuffer<RESPONSE_BUFFER_SIZE>>,
    json_objects: TypedPool<JsonValue>,
    vector_blocks: TypedPool<VectorBlock>,
    arena_size: usize,
}

impl PoolManager {
    pub fn new(sizes: PoolSizes, arena_size: usize) -> Self {
        Self {
            request_buffers: TypedPool::new("request-buffers", sizes.request_buffers),
            response_buffers: TypedPool::new("response-buffers", sizes.response_buffers),
            json_objects: TypedPool::new("json-objects", sizes.json_objects),
            vector_blocks: TypedPool::new("vector-blocks", sizes.vector_blocks),
            arena_size,
        }
    }

    pub fn acquire_arena(&self) -> Arena {
        Arena::new(self.arena_size)
    }

    pub fn acquire_arena_sized(&self, limit: usize) -> Arena {
        Arena::new(limit)
    }

    pub fn acquire_request_buffer(&self) -> Result<PoolHandle, PoolError> {
        self.request_buffers.acquire()
    }

    pub fn release_request_buffer(&self, handle: PoolHandle) {
        self.request_buffers.release(handle)
    }

    pub fn with_request_buffer<R>(
        &self,
        handle: PoolHandle,
        f: impl FnOnce(&mut FixedBuffer<REQUEST_BUFFER_SIZE>) -> R,
    ) -> R {
        self.request_buffers.with(handle, f)
    }

    pub fn acquire_response_buffer(&self) -> Result<PoolHandle, PoolError> {
        self.response_buffers.acquire()
    }

    pub fn release_response_buffer(&self, handle: PoolHandle) {
        self.response_buffers.release(handle)
    }

    pub fn with_response_buffer<R>(
        &self,
        handle: PoolHandle,
        f: impl FnOnce(&mut FixedBuffer<RESPONSE_BUFFER_SIZE>) -> R,
    ) -> R {
        self.response_buffers.with(handle, f)
    }

    pub fn acquire_json(&self) -> Result<PoolHandle, PoolError> {
        self.json_objects.acquire()
    }

    pub fn release_json(&self, handle: PoolHandle) {
        self.json_objects.release(handle)
    }

    pub fn with_json<R>(&self, handle: PoolHandle, f: impl FnOnce(&mut JsonValue) -> R) -> R {
        self.json_objects.with(handle, f)
    }

    pub fn acquire_vector_block(&self) -> Result<PoolHandle, PoolError> {
        self.vector_blocks.acquire()
    }

    pub fn release_vector_block(&self, handle: PoolHandle) {
        self.vector_blocks.release(handle)
    }

    pub fn with_vector_block<R>(&self, handle: PoolHandle, f: impl FnOnce(&mut VectorBlock) -> R) -> R {
        self.vector_blocks.with(handle, f)
    }

    pub fn stats(&self) -> PoolManagerStats {
        PoolManagerStats {
            request_buffers: PoolStat::from(&self.request_buffers),
            response_buffers: PoolStat::from(&self.response_buffers),
            json_objects: PoolStat::from(&self.json_objects),
            vector_blocks: PoolStat::from(&self.vector_blocks),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStat {
    pub capacity: usize,
    pub in_use: usize,
    pub free: usize,
}

impl<T: Default> From<&TypedPool<T>> for PoolStat {
    fn from(pool: &TypedPool<T>) -> Self {
        Self {
            capacity: pool.capacity(),
            in_use: pool.in_use_count(),
            free: pool.free_count(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolManagerStats {
    pub request_buffers: PoolStat,
    pub response_buffers: PoolStat,
    pub json_objects: PoolStat,
    pub vector_blocks: PoolStat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pools_serve_all_four_shapes() {
        let mgr = PoolManager::new(PoolSizes::default(), 1 << 20);
        let rb = mgr.acquire_request_buffer().unwrap();
        let resp = mgr.acquire_response_buffer().unwrap();
        let js = mgr.acquire_json().unwrap();
        let vb = mgr.acquire_vector_block().unwrap();

        mgr.with_vector_block(vb, |b| assert!(b.fill(&[1.0, 2.0, 3.0])));
        mgr.with_json(js, |v| *v = serde_json::json!({"k": 1}));

        mgr.release_request_buffer(rb);
        mgr.release_response_buffer(resp);
        mgr.release_json(js);
        mgr.release_vector_block(vb);

        let stats = mgr.stats();
        assert_eq!(stats.request_buffers.in_use, 0);
        assert_eq!(stats.vector_blocks.in_use, 0);
    }

    #[test]
    fn arena_is_independent_per_request() {
        let mgr = PoolManager::new(PoolSizes::default(), 4096);
        let a1 = mgr.acquire_arena();
        let a2 = mgr.acquire_arena();
        assert_ne!(a1.id(), a2.id());
    }
}
