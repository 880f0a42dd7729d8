/// Non-negative weights for the three evidence axes. Callers
/// are expected to pass weights summing to 1, but `fuse` does not enforce
/// that — a caller experimenting with an unnormalized blend still gets a
/// deterministic (if differently-scaled) answer.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub lexical: f64,
    pub semantic: f64,
    pub graph: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: 0.34,
            semantic: 0.33,
            graph: 0.33,
        }
    }
}

/// Per-backend result caps, the final result limit, and traversal tuning.
#[derive(Debug, Clone, Copy)]
pub struct FusionParams {
    pub weights: FusionWeights,
    pub cap_lexical: usize,
    pub cap_semantic: usize,
    pub graph_bound: f64,
    /// Frontier-reduction block size for the graph axis's traversal,
    /// forwarded to `traverse_bounded_with_config` rather than the
    /// hardcoded default.
    pub graph_block_size: usize,
    pub limit: usize,
    pub min_score: Option<f64>,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            cap_lexical: 50,
            cap_semantic: 50,
            graph_bound: 3.0,
            graph_block_size: 64,
            limit: 10,
            min_score: None,
        }
    }
}

/// The query itself: a free-text axis, a vector axis, and a set of graph
/// seeds. Any subset may be present; an absent axis contributes 0 to every
/// path's combined score.
#[derive(Debug, Clone, Default)]
pub struct FusionRequest {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
    pub effective_dim: Option<usize>,
    pub seeds: Vec<String>,
}
