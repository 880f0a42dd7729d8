use agrama_graph::FrontierConfig;
use agrama_lexical::Bm25Config;
use agrama_pool::PoolSizes;
use agrama_semantic::HnswConfig;
use agrama_temporal::PathPolicy;
use serde::{Deserialize, Serialize};

/// The startup configuration record covering every tunable the engine and
/// its backends need. `agrama-cli` loads this from an optional TOML file
/// with flag overrides, but the engine crate itself has no opinion on
/// where a `Config` comes from — callers can also build one by hand for
/// tests and embedders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dimension D for the semantic index (64 <= D <= 3072).
    pub embedding_dim: usize,
    pub hnsw_m: usize,
    pub hnsw_m0: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub hnsw_level_multiplier: f64,
    pub fre_block_size: usize,
    pub fre_max_bound: f64,
    pub bm25_k: f64,
    pub bm25_b: f64,
    pub pool_request_buffers: usize,
    pub pool_response_buffers: usize,
    pub pool_json_objects: usize,
    pub pool_vector_blocks: usize,
    pub arena_size: usize,
    pub allowed_path_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let hnsw = HnswConfig::new(768);
        let fre = FrontierConfig::default();
        let bm25 = Bm25Config::default();
        let pools = PoolSizes::default();
        Self {
            embedding_dim: hnsw.dim,
            hnsw_m: hnsw.m,
            hnsw_m0: hnsw.m0,
            hnsw_ef_construction: hnsw.ef_construction,
            hnsw_ef_search: hnsw.ef_search,
            hnsw_level_multiplier: hnsw.level_multiplier,
            fre_block_size: fre.block_size,
            fre_max_bound: fre.default_bound,
            bm25_k: bm25.k,
            bm25_b: bm25.b,
            pool_request_buffers: pools.request_buffers,
            pool_response_buffers: pools.response_buffers,
            pool_json_objects: pools.json_objects,
            pool_vector_blocks: pools.vector_blocks,
            arena_size: 1 << 20,
            allowed_path_prefixes: PathPolicy::default().allowed_prefixes,
        }
    }
}

impl Config {
    /// Validates cross-field constraints a plain `Deserialize` can't
    /// express.
    pub fn validate(&self) -> Result<(), String> {
        if !(64..=3072).contains(&self.embedding_dim) {
            return Err(format!(
                "embedding_dim {} is outside the allowed range 64..=3072",
                self.embedding_dim
            ));
        }
        if self.hnsw_m0 < 2 * self.hnsw_m {
            return Err(format!(
                "hnsw_m0 ({}) must be at least 2 * hnsw_m ({})",
                self.hnsw_m0, self.hnsw_m
            ));
        }
        Ok(())
    }

    pub fn hnsw_config(&self) -> HnswConfig {
        HnswConfig {
            dim: self.embedding_dim,
            m: self.hnsw_m,
            m0: self.hnsw_m0,
            ef_construction: self.hnsw_ef_construction,
            ef_search: self.hnsw_ef_search,
            level_multiplier: self.hnsw_level_multiplier,
        }
    }

    pub fn frontier_config(&self) -> FrontierConfig {
        FrontierConfig {
            block_size: self.fre_block_size,
            default_bound: self.fre_max_bound,
        }
    }

    pub fn bm25_config(&self) -> Bm25Config {
        Bm25Config {
            k: self.bm25_k,
            b: self.bm25_b,
        }
    }

    pub fn pool_sizes(&self) -> PoolSizes {
        PoolSizes {
            request_buffers: self.pool_request_buffers,
            response_buffers: self.pool_response_buffers,
            json_objects: self.pool_json_objects,
            vector_blocks: self.pool_vector_blocks,
        }
    }

    pub fn path_policy(&self) -> PathPolicy {
        PathPolicy {
            allowed_prefixes: self.allowed_path_prefixes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_dimension_is_rejected() {
        let mut cfg = Config::default();
        cfg.embedding_dim = 8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_round_trips() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.embedding_dim, cfg.embedding_dim);
    }
}
