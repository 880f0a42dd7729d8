//! Triple-fusion query planner: dispatches a query across the
//! lexical, semantic and graph backends concurrently, normalizes each
//! axis's raw scores, and returns a single weighted ranking.

mod error;
mod fuse;
mod types;

pub use error::FusionError;
pub use fuse::{fuse, FusionOutcome};
pub use types::{FusionParams, FusionRequest, FusionWeights};
