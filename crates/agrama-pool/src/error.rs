use thiserror::Error;

/// Errors surfaced by the pool subsystem.
///
/// `Exhausted` is retriable by the caller (the pool subsystem itself never
/// retries or falls back to the global allocator for a pooled shape).
/// `DoubleRelease` is never returned to a caller: observing it means an
/// invariant was violated and the process aborts before this value escapes
/// the pool module, per the core's `internal_error` policy.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{pool}' is exhausted (capacity reached)")]
    Exhausted { pool: &'static str },

    #[error("double release of handle {handle} in pool '{pool}'")]
    DoubleRelease { pool: &'static str, handle: u32 },

    #[error("arena '{arena}' allocation of {requested} bytes exceeds limit {limit}")]
    ArenaLimitExceeded {
        arena: &'static str,
        requested: usize,
        limit: usize,
    },
}

/// Logs at error level and aborts the process. This is the one sanctioned
/// panic-equivalent path in the pool subsystem: a double release or a torn
/// invariant means the free list can no longer be trusted, and continuing
/// risks silently handing the same slot to two callers.
pub(crate) fn fatal(msg: impl std::fmt::Display) -> ! {
    tracing::error!("agrama-pool: fatal invariant violation: {msg}");
    std::process::abort()
}
