use agrama_fusion::FusionError;
use agrama_graph::GraphError;
use agrama_lexical::LexicalError;
use agrama_pool::PoolError;
use agrama_semantic::HnswError;
use agrama_temporal::TemporalError;
use thiserror::Error;

/// The full error taxonomy the engine surfaces to callers. Every backend
/// error converts into one of these variants via `#[from]`, so a caller one
/// layer up from the engine only ever matches on `EngineError`, never on a
/// backend-specific type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("edge has a negative weight: {0}")]
    NegativeWeight(String),

    #[error("pool exhausted: {pool}")]
    PoolExhausted { pool: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    /// The `ErrorKind` tag stamped into event records and returned to
    /// adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::InvalidPath(_) => ErrorKind::InvalidPath,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            EngineError::NegativeWeight(_) => ErrorKind::NegativeWeight,
            EngineError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            EngineError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Whether a caller may usefully retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, EngineError::PoolExhausted { .. })
    }
}

/// The taxonomy's name tags, serializable for event records and adapter
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidPath,
    NotFound,
    DimensionMismatch,
    NegativeWeight,
    PoolExhausted,
    Cancelled,
    BackendUnavailable,
    InternalError,
}

impl From<PoolError> for EngineError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Exhausted { pool } => EngineError::PoolExhausted { pool: pool.to_string() },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<TemporalError> for EngineError {
    fn from(e: TemporalError) -> Self {
        match e {
            TemporalError::InvalidPath(msg) => EngineError::InvalidPath(msg),
            TemporalError::NotFound(msg) => EngineError::NotFound(msg),
            TemporalError::OutOfMemory(msg) => EngineError::Internal(format!("out of memory: {msg}")),
        }
    }
}

impl From<HnswError> for EngineError {
    fn from(e: HnswError) -> Self {
        match e {
            HnswError::DimensionMismatch { expected, got } => {
                EngineError::DimensionMismatch { expected, got }
            }
            HnswError::IndexEmpty => EngineError::NotFound("semantic index is empty".into()),
            HnswError::PrecisionExceedsFullDimension { requested, full } => EngineError::InvalidInput(
                format!("progressive-precision dimension {requested} exceeds full dimension {full}"),
            ),
        }
    }
}

impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::InvalidPath(msg) => EngineError::InvalidPath(msg),
            GraphError::NegativeWeight { from, to, kind } => {
                EngineError::NegativeWeight(format!("{from} -> {to} ({kind})"))
            }
            GraphError::UnknownSource(p) => EngineError::NotFound(p),
        }
    }
}

impl From<LexicalError> for EngineError {
    fn from(e: LexicalError) -> Self {
        match e {
            LexicalError::EmptyQuery => EngineError::InvalidInput("empty lexical query".into()),
        }
    }
}

impl From<FusionError> for EngineError {
    fn from(e: FusionError) -> Self {
        match e {
            FusionError::AllBackendsFailed => EngineError::BackendUnavailable("all fusion backends failed".into()),
        }
    }
}

/// Logs the invariant violation then aborts the process — the one
/// sanctioned panic-equivalent path in the engine.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        std::process::abort()
    }};
}
