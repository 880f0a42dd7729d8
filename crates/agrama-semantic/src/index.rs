use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rand_distr::{Distribution, Geometric};
use serde::{Deserialize, Serialize};

use crate::config::HnswConfig;
use crate::distance::euclidean_prefix;
use crate::error::HnswError;
use crate::node::{NodeArena, NodeData, NodeHandle};

/// A scored candidate during beam search, ordered by ascending distance
/// with ties broken by the lower node handle, so result sets are
/// reproducible across runs.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist: f64,
    handle: NodeHandle,
}
impl Eq for Candidate {}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.handle.cmp(&other.handle))
    }
}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap ordering (reversed `Candidate`), used for the explore frontier
/// so `BinaryHeap::pop` always yields the nearest unexplored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nearest(Candidate);
impl Ord for Nearest {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}
impl PartialOrd for Nearest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn sample_level(level_multiplier: f64) -> usize {
    let p = (1.0 - (-1.0_f64 / level_multiplier).exp()).clamp(1e-6, 1.0);
    let dist = Geometric::new(p).expect("level_multiplier yields a valid geometric parameter");
    dist.sample(&mut rand::thread_rng()) as usize
}

/// Beam search of width `ef` over a single layer, starting from `entry`.
/// Returns up to `ef` candidates sorted by ascending distance (ties broken
/// by handle), the basis for both the construction-time neighbor search and
/// the query-time `ef_search` pass.
fn search_layer(
    arena: &NodeArena,
    entry: NodeHandle,
    query: &[f32],
    level: usize,
    ef: usize,
    dim: usize,
) -> Vec<Candidate> {
    let entry_dist = euclidean_prefix(query, &arena.get(entry).vector, dim);
    let mut visited: HashSet<NodeHandle> = HashSet::new();
    visited.insert(entry);

    let mut explore: BinaryHeap<Nearest> = BinaryHeap::new();
    explore.push(Nearest(Candidate {
        dist: entry_dist,
        handle: entry,
    }));

    let mut results: Vec<Candidate> = vec![Candidate {
        dist: entry_dist,
        handle: entry,
    }];

    while let Some(Nearest(cur)) = explore.pop() {
        let worst = results
            .last()
            .map(|c| c.dist)
            .unwrap_or(f64::INFINITY);
        if results.len() >= ef && cur.dist > worst {
            break;
        }
        for neighbor in arena.get(cur.handle).neighbors_at(level) {
            if !visited.insert(neighbor) {
                continue;
            }
            let d = euclidean_prefix(query, &arena.get(neighbor).vector, dim);
            if results.len() < ef || d < worst {
                let candidate = Candidate { dist: d, handle: neighbor };
                explore.push(Nearest(candidate));
                let pos = results.partition_point(|c| *c < candidate);
                results.insert(pos, candidate);
                if results.len() > ef {
                    results.truncate(ef);
                }
            }
        }
    }
    results
}

/// Selects up to `target` neighbors from `candidates` (already sorted
/// ascending by distance/handle) favoring diverse directions over pure
/// proximity: a candidate is kept only if it is closer to the query than
/// to every neighbor already selected, so a tight cluster of near-duplicate
/// candidates doesn't crowd out a farther candidate in a different
/// direction.
fn select_neighbors_heuristic(
    arena: &NodeArena,
    query: &[f32],
    candidates: &[Candidate],
    target: usize,
    dim: usize,
) -> Vec<NodeHandle> {
    let mut selected: Vec<Candidate> = Vec::with_capacity(target);
    for &cand in candidates {
        if selected.len() >= target {
            break;
        }
        let cand_vec = &arena.get(cand.handle).vector;
        let diverse = selected.iter().all(|s| {
            let sel_vec = &arena.get(s.handle).vector;
            euclidean_prefix(cand_vec, sel_vec, dim) >= cand.dist
        });
        if diverse {
            selected.push(cand);
        }
    }
    // Backfill with the closest remaining candidates if the heuristic was
    // too strict to reach `target` (keeps recall from degrading on the
    // smallest graphs, where diversity among a handful of points is moot).
    if selected.len() < target {
        for &cand in candidates {
            if selected.len() >= target {
                break;
            }
            if !selected.iter().any(|s| s.handle == cand.handle) {
                selected.push(cand);
            }
        }
    }
    selected.into_iter().map(|c| c.handle).collect()
}

/// Layered proximity graph over embedding vectors. Insertion
/// and query both descend from a single entry point through the sparse
/// upper levels before doing a beam search at level 0, the densest level.
pub struct HnswIndex {
    config: HnswConfig,
    arena: NodeArena,
    path_to_handle: RwLock<HashMap<Arc<str>, NodeHandle>>,
    entry_point: RwLock<Option<(NodeHandle, usize)>>,
}

impl HnswIndex {
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            arena: NodeArena::default(),
            path_to_handle: RwLock::new(HashMap::new()),
            entry_point: RwLock::new(None),
        }
    }

    pub fn config(&self) -> HnswConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn handle_of(&self, path: &str) -> Option<NodeHandle> {
        self.path_to_handle.read().get(path).copied()
    }

    /// Inserts a full-precision embedding under `path`. Always stores the
    /// complete vector — progressive precision is a query-time slice, not a
    /// storage format.
    #[tracing::instrument(skip(self, vector), fields(path = %path.as_ref()))]
    pub fn insert(&self, path: impl AsRef<str>, vector: Vec<f32>) -> Result<NodeHandle, HnswError> {
        if vector.len() != self.config.dim {
            return Err(HnswError::DimensionMismatch {
                expected: self.config.dim,
                got: vector.len(),
            });
        }
        let path: Arc<str> = Arc::from(path.as_ref());
        let level = sample_level(self.config.level_multiplier);
        let node = NodeData::new(Arc::clone(&path), vector.clone(), level);
        let handle = self.arena.push(node);
        self.path_to_handle.write().insert(path, handle);

        let existing_entry = {
            let mut ep = self.entry_point.write();
            match *ep {
                None => {
                    *ep = Some((handle, level));
                    None
                }
                Some(e) => Some(e),
            }
        };
        let Some((ep, top_level)) = existing_entry else {
            return Ok(handle);
        };

        let dim = self.config.dim;
        let mut best = ep;
        let mut best_dist = euclidean_prefix(&vector, &self.arena.get(ep).vector, dim);
        for lc in ((level + 1)..=top_level).rev() {
            loop {
                let mut improved = false;
                for n in self.arena.get(best).neighbors_at(lc) {
                    let d = euclidean_prefix(&vector, &self.arena.get(n).vector, dim);
                    if d < best_dist {
                        best_dist = d;
                        best = n;
                        improved = true;
                    }
                }
                if !improved {
                    break;
                }
            }
        }

        for lc in (0..=level.min(top_level)).rev() {
            let candidates = search_layer(&self.arena, best, &vector, lc, self.config.ef_construction, dim);
            let cap = if lc == 0 { self.config.m0 } else { self.config.m };
            let selected = select_neighbors_heuristic(&self.arena, &vector, &candidates, cap, dim);

            self.arena.get(handle).set_neighbors_at(lc, selected.clone());
            for &n in &selected {
                self.arena.get(n).add_neighbor_at(lc, handle);
                self.prune_if_overfull(n, lc, cap, dim);
            }
            if let Some(closest) = candidates.first() {
                best = closest.handle;
            }
        }

        if level > top_level {
            *self.entry_point.write() = Some((handle, level));
        }

        Ok(handle)
    }

    /// Re-applies the selection heuristic to a neighbor list that has grown
    /// past its cap after a new bidirectional link was installed, pruning
    /// over-connected neighbors by the same diversity-favoring rule used
    /// at insertion time.
    fn prune_if_overfull(&self, node: NodeHandle, level: usize, cap: usize, dim: usize) {
        let data = self.arena.get(node);
        let current = data.neighbors_at(level);
        if current.len() <= cap {
            return;
        }
        let mut scored: Vec<Candidate> = current
            .iter()
            .map(|&h| Candidate {
                dist: euclidean_prefix(&data.vector, &self.arena.get(h).vector, dim),
                handle: h,
            })
            .collect();
        scored.sort();
        let pruned = select_neighbors_heuristic(&self.arena, &data.vector, &scored, cap, dim);
        data.set_neighbors_at(level, pruned);
    }

    /// Returns the `k` nearest indexed paths to `query`, optionally
    /// restricted to the leading `effective_dim` components of every
    /// stored vector. `k` larger than the index size returns every node.
    #[tracing::instrument(skip(self, query))]
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        effective_dim: Option<usize>,
    ) -> Result<Vec<(Arc<str>, f64)>, HnswError> {
        if self.arena.is_empty() {
            return Err(HnswError::IndexEmpty);
        }
        let dim = effective_dim.unwrap_or(self.config.dim);
        if dim > self.config.dim {
            return Err(HnswError::PrecisionExceedsFullDimension {
                requested: dim,
                full: self.config.dim,
            });
        }
        if query.len() != dim {
            return Err(HnswError::DimensionMismatch {
                expected: dim,
                got: query.len(),
            });
        }

        let (ep, top_level) = self
            .entry_point
            .read()
            .expect("a non-empty index always has an entry point");

        let mut best = ep;
        let mut best_dist = euclidean_prefix(query, &self.arena.get(ep).vector, dim);
        for lc in (1..=top_level).rev() {
            loop {
                let mut improved = false;
                for n in self.arena.get(best).neighbors_at(lc) {
                    let d = euclidean_prefix(query, &self.arena.get(n).vector, dim);
                    if d < best_dist || (d == best_dist && n < best) {
                        best_dist = d;
                        best = n;
                        improved = true;
                    }
                }
                if !improved {
                    break;
                }
            }
        }

        let ef = self.config.ef_search.max(k);
        let candidates = search_layer(&self.arena, best, query, 0, ef, dim);
        Ok(candidates
            .into_iter()
            .take(k)
            .map(|c| {
                let node = self.arena.get(c.handle);
                (Arc::clone(&node.path), c.dist)
            })
            .collect())
    }

    /// Captures every indexed path's full-precision vector. The layered neighbor graph itself is not
    /// serialized — it's rebuilt on restore by replaying `insert`, which
    /// regenerates an equivalent graph deterministically enough for recall
    /// purposes without needing to persist per-level adjacency.
    pub fn snapshot(&self) -> SemanticSnapshot {
        let handles = self.path_to_handle.read();
        let vectors = handles
            .iter()
            .map(|(path, &handle)| VectorSnapshot {
                path: path.to_string(),
                vector: self.arena.get(handle).vector.clone(),
            })
            .collect();
        SemanticSnapshot { vectors }
    }

    /// Rebuilds an index from a prior `snapshot()` by replaying every
    /// vector through `insert()`.
    pub fn restore(config: HnswConfig, snapshot: SemanticSnapshot) -> Result<Self, HnswError> {
        let index = Self::new(config);
        for v in snapshot.vectors {
            index.insert(v.path, v.vector)?;
        }
        Ok(index)
    }
}

/// One indexed path's full-precision vector, serializable for
/// [`HnswIndex::snapshot`]/[`HnswIndex::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSnapshot {
    pub path: String,
    pub vector: Vec<f32>,
}

/// The complete logical state of an [`HnswIndex`]: every indexed path's
/// vector, from which the layered graph is rebuilt on restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticSnapshot {
    pub vectors: Vec<VectorSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dim: usize) -> HnswConfig {
        HnswConfig::new(dim)
    }

    #[test]
    fn insert_then_search_finds_itself() {
        let idx = HnswIndex::new(cfg(8));
        idx.insert("a", vec![1.0; 8]).unwrap();
        idx.insert("b", vec![-1.0; 8]).unwrap();
        let results = idx.search(&[1.0; 8], 1, None).unwrap();
        assert_eq!(&*results[0].0, "a");
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let idx = HnswIndex::new(cfg(8));
        assert!(matches!(
            idx.insert("a", vec![1.0; 4]),
            Err(HnswError::DimensionMismatch { expected: 8, got: 4 })
        ));
    }

    #[test]
    fn query_against_empty_index_errors() {
        let idx = HnswIndex::new(cfg(8));
        assert!(matches!(idx.search(&[0.0; 8], 1, None), Err(HnswError::IndexEmpty)));
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let idx = HnswIndex::new(cfg(4));
        for i in 0..5 {
            idx.insert(format!("p{i}"), vec![i as f32; 4]).unwrap();
        }
        let results = idx.search(&[0.0; 4], 100, None).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn progressive_precision_prefix_matches_full_precision_slice() {
        let idx = HnswIndex::new(cfg(8));
        idx.insert("a", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        idx.insert("b", vec![8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();

        let query = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        let coarse = idx.search(&query[..4], 2, Some(4)).unwrap();
        assert_eq!(&*coarse[0].0, "a");
    }

    #[test]
    fn s2_recall_on_two_well_separated_clusters() {
        let dim = 16;
        let idx = HnswIndex::new(cfg(dim));
        let mut rng_state: u64 = 42;
        let mut next = || {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng_state >> 33) as f32 / u32::MAX as f32) - 0.5
        };

        let cluster_a_center = vec![0.0f32; dim];
        let cluster_b_center = vec![50.0f32; dim];

        for i in 0..100 {
            let v: Vec<f32> = cluster_a_center.iter().map(|c| c + next() * 0.5).collect();
            idx.insert(format!("a{i}"), v).unwrap();
        }
        for i in 0..100 {
            let v: Vec<f32> = cluster_b_center.iter().map(|c| c + next() * 0.5).collect();
            idx.insert(format!("b{i}"), v).unwrap();
        }

        let results = idx.search(&cluster_a_center, 10, None).unwrap();
        assert!(results.iter().all(|(path, _)| path.starts_with('a')));
    }

    #[test]
    fn snapshot_then_restore_preserves_search_results() {
        let idx = HnswIndex::new(cfg(8));
        idx.insert("a", vec![1.0; 8]).unwrap();
        idx.insert("b", vec![-1.0; 8]).unwrap();

        let snapshot = idx.snapshot();
        let restored = HnswIndex::restore(cfg(8), snapshot).unwrap();

        assert_eq!(restored.len(), idx.len());
        let results = restored.search(&[1.0; 8], 1, None).unwrap();
        assert_eq!(&*results[0].0, "a");
    }
}
