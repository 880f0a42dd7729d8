use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemporalError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("out of memory allocating for path: {0}")]
    OutOfMemory(String),
}
