use serde_json::Map as JsonMap;
use std::sync::Arc;

/// A directed, typed edge. Two edges are distinct if any of `(from, to,
/// kind)` differ; `weight`/`attrs` are mutable properties of that
/// triple, not part of its identity — re-inserting the same triple with a
/// new weight updates the existing edge rather than creating a duplicate.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: Arc<str>,
    pub to: Arc<str>,
    pub kind: Arc<str>,
    pub weight: f64,
    pub attrs: JsonMap<String, serde_json::Value>,
}

impl Edge {
    pub fn identity_matches(&self, from: &str, to: &str, kind: &str) -> bool {
        &*self.from == from && &*self.to == to && &*self.kind == kind
    }
}
