use thiserror::Error;

#[derive(Debug, Error)]
pub enum HnswError {
    #[error("embedding dimension mismatch: index is configured for {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index is empty")]
    IndexEmpty,

    #[error("progressive-precision query dimension {requested} exceeds full dimension {full}")]
    PrecisionExceedsFullDimension { requested: usize, full: usize },
}
