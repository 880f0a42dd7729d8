/// Tuning knobs for the layered ANN graph. `m0` defaults to `2 * m`, the
/// higher neighbor cap level 0 needs to preserve connectivity once the
/// sparser upper levels have thinned out.
#[derive(Debug, Clone, Copy)]
pub struct HnswConfig {
    pub dim: usize,
    pub m: usize,
    pub m0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub level_multiplier: f64,
}

impl HnswConfig {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default_for_dim(dim)
        }
    }

    fn default_for_dim(dim: usize) -> Self {
        let m = 16;
        Self {
            dim,
            m,
            m0: 2 * m,
            ef_construction: 200,
            ef_search: 64,
            level_multiplier: 1.0 / (m as f64).ln(),
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::default_for_dim(768)
    }
}
