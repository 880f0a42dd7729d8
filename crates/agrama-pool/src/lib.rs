//! Memory-pool subsystem.
//!
//! Provides bounded-latency allocation for Agrama's hot paths by segregating
//! allocations by shape into fixed-capacity pools, and scoped arenas for
//! per-request temporary data. Pool exhaustion is a retriable error, never a
//! silent fallback to the global allocator — predictability over
//! opportunism.

mod arena;
mod blocks;
mod error;
mod manager;
mod typed_pool;

pub use arena::{Arena, ArenaBytes, ArenaJson};
pub use blocks::{FixedBuffer, VectorBlock, MAX_EMBEDDING_DIM, REQUEST_BUFFER_SIZE, RESPONSE_BUFFER_SIZE};
pub use error::PoolError;
pub use manager::{PoolManager, PoolManagerStats, PoolSizes, PoolStat};
pub use typed_pool::{PoolHandle, TypedPool};
