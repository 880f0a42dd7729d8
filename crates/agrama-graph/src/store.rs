use std::collections::HashMap;
use std::sync::Arc;

use agrama_temporal::{Path as ValidatedPath, PathPolicy};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;

use crate::edge::Edge;
use crate::error::GraphError;

struct Inner {
    out: HashMap<Arc<str>, Vec<Edge>>,
    in_: HashMap<Arc<str>, Vec<Edge>>,
}

/// Typed directed edges with a forward adjacency list (by source) and a
/// reverse index (by target) for bidirectional queries.
///
/// A single reader-writer lock protects both maps: traversals take the
/// reader side for their duration, and edge mutation is comparatively rare
/// next to traversal reads, so one lock over the whole structure is the
/// simplest discipline that fits the access pattern.
pub struct GraphStore {
    inner: RwLock<Inner>,
    path_policy: PathPolicy,
}

impl GraphStore {
    pub fn new(path_policy: PathPolicy) -> Self {
        Self {
            inner: RwLock::new(Inner {
                out: HashMap::new(),
                in_: HashMap::new(),
            }),
            path_policy,
        }
    }

    fn validate(&self, raw: &str) -> Result<Arc<str>, GraphError> {
        ValidatedPath::parse(raw, &self.path_policy)
            .map(|p| Arc::from(p.as_str()))
            .map_err(|e| GraphError::InvalidPath(e.to_string()))
    }

    /// Inserts (or upserts, if the `(from, to, kind)` triple already
    /// exists) an edge. Non-negative weight is enforced before any mutation
    /// — a negative weight never reaches the adjacency maps.
    pub fn add_edge(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        weight: f64,
        attrs: JsonMap<String, serde_json::Value>,
    ) -> Result<(), GraphError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::NegativeWeight {
                from: from.to_string(),
                to: to.to_string(),
                kind: kind.to_string(),
            });
        }
        let from = self.validate(from)?;
        let to = self.validate(to)?;
        let kind: Arc<str> = Arc::from(kind);

        let mut inner = self.inner.write();

        let edge = Edge {
            from: Arc::clone(&from),
            to: Arc::clone(&to),
            kind: Arc::clone(&kind),
            weight,
            attrs,
        };

        upsert(inner.out.entry(Arc::clone(&from)).or_default(), &edge);
        upsert(inner.in_.entry(Arc::clone(&to)).or_default(), &edge);
        Ok(())
    }

    /// Removes the edge matching `(from, to, kind)`, if present. Removing a
    /// nonexistent edge is a no-op, leaving adjacency lists unchanged.
    pub fn remove_edge(&self, from: &str, to: &str, kind: &str) {
        let mut inner = self.inner.write();
        if let Some(list) = inner.out.get_mut(from) {
            list.retain(|e| !e.identity_matches(from, to, kind));
        }
        if let Some(list) = inner.in_.get_mut(to) {
            list.retain(|e| !e.identity_matches(from, to, kind));
        }
    }

    pub fn neighbors_out(&self, path: &str) -> Vec<Edge> {
        self.inner
            .read()
            .out
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn neighbors_in(&self, path: &str) -> Vec<Edge> {
        self.inner
            .read()
            .in_
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_node(&self, path: &str) -> bool {
        let inner = self.inner.read();
        inner.out.contains_key(path) || inner.in_.contains_key(path)
    }

    pub(crate) fn with_out_adjacency<R>(&self, f: impl FnOnce(&HashMap<Arc<str>, Vec<Edge>>) -> R) -> R {
        f(&self.inner.read().out)
    }

    pub(crate) fn with_in_adjacency<R>(&self, f: impl FnOnce(&HashMap<Arc<str>, Vec<Edge>>) -> R) -> R {
        f(&self.inner.read().in_)
    }

    /// Every edge currently in the store, in no particular cross-source
    /// order.
    pub fn snapshot(&self) -> GraphSnapshot {
        let inner = self.inner.read();
        let edges = inner
            .out
            .values()
            .flatten()
            .map(|e| EdgeSnapshot {
                from: e.from.to_string(),
                to: e.to.to_string(),
                kind: e.kind.to_string(),
                weight: e.weight,
                attrs: e.attrs.clone(),
            })
            .collect();
        GraphSnapshot { edges }
    }

    /// Rebuilds a store by replaying every edge from a prior `snapshot()`
    /// through `add_edge`, so the same validation (path grammar,
    /// non-negative weight) applies on restore as on first insertion.
    pub fn restore(path_policy: PathPolicy, snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let store = Self::new(path_policy);
        for e in snapshot.edges {
            store.add_edge(&e.from, &e.to, &e.kind, e.weight, e.attrs)?;
        }
        Ok(store)
    }
}

/// One edge's fields, serializable for [`GraphStore::snapshot`]/[`GraphStore::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub from: String,
    pub to: String,
    pub kind: String,
    pub weight: f64,
    pub attrs: JsonMap<String, serde_json::Value>,
}

/// The complete logical state of a [`GraphStore`]: every edge, forward and
/// reverse indices rebuilt on restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub edges: Vec<EdgeSnapshot>,
}

fn upsert(list: &mut Vec<Edge>, edge: &Edge) {
    if let Some(existing) = list
        .iter_mut()
        .find(|e| e.identity_matches(&edge.from, &edge.to, &edge.kind))
    {
        existing.weight = edge.weight;
        existing.attrs = edge.attrs.clone();
    } else {
        list.push(edge.clone());
    }
}
