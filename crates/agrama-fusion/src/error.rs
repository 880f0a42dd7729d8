use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("all backends failed or produced no usable query axis")]
    AllBackendsFailed,
}
