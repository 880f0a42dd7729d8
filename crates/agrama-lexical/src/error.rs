use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexicalError {
    #[error("query produced no usable terms")]
    EmptyQuery,
}
