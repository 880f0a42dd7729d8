use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("edge {from} -> {to} ({kind}) has a negative weight")]
    NegativeWeight {
        from: String,
        to: String,
        kind: String,
    },

    #[error("unknown source node: {0}")]
    UnknownSource(String),
}
