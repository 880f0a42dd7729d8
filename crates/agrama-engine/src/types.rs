use agrama_fusion::FusionWeights;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Parameters for the `store` primitive.
#[derive(Debug, Clone, Default)]
pub struct StoreParams {
    pub path: String,
    pub content: Vec<u8>,
    pub metadata: Option<JsonMap<String, JsonValue>>,
    pub embedding: Option<Vec<f32>>,
    pub tokens: Option<String>,
    /// Opts this write into the per-path CRDT merge path instead of plain
    /// last-writer-wins.
    pub crdt: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub path: String,
    pub history_len: usize,
    pub indexed_lexical: bool,
    pub indexed_semantic: bool,
}

/// Parameters for the `retrieve` primitive.
#[derive(Debug, Clone, Default)]
pub struct RetrieveParams {
    pub path: String,
    pub history_limit: Option<usize>,
    pub include_neighbors: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveOutcome {
    pub path: String,
    pub content: Vec<u8>,
    pub history: Vec<HistoryEntry>,
    pub neighbors_out: Vec<EdgeSummary>,
    pub neighbors_in: Vec<EdgeSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSummary {
    pub from: String,
    pub to: String,
    pub kind: String,
    pub weight: f64,
}

/// Which backend(s) `search` dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Lexical,
    Semantic,
    Graph,
    Hybrid,
    Temporal,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub mode: Option<SearchMode>,
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
    pub effective_dim: Option<usize>,
    pub seeds: Vec<String>,
    pub weights: Option<FusionWeights>,
    pub graph_bound: Option<f64>,
    pub limit: usize,
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<(String, f64)>,
    pub warnings: Vec<String>,
}

/// Parameters for the `link` primitive.
#[derive(Debug, Clone, Default)]
pub struct LinkParams {
    pub from: String,
    pub to: String,
    pub kind: String,
    pub weight: Option<f64>,
    pub attrs: Option<JsonMap<String, JsonValue>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkOutcome {
    pub from: String,
    pub to: String,
    pub kind: String,
}

/// Parameters for the `transform` primitive.
#[derive(Debug, Clone, Default)]
pub struct TransformParams {
    pub operation: String,
    pub inputs: Vec<String>,
    pub params: JsonValue,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformOutcome {
    pub path: String,
    pub content: Vec<u8>,
    pub metadata: JsonMap<String, JsonValue>,
}
