use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::edge::Edge;
use crate::error::GraphError;
use crate::store::GraphStore;

/// Tuning for the frontier-reduction traversal: block size and default
/// distance bound.
#[derive(Debug, Clone, Copy)]
pub struct FrontierConfig {
    /// Number of distance-range blocks the frontier is partitioned into.
    /// Each block is processed with a small local heap bounded by the
    /// block's own population rather than one global heap over every
    /// discovered node.
    pub block_size: usize,
    pub default_bound: f64,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            block_size: 64,
            default_bound: 10.0,
        }
    }
}

/// `(distance, predecessor)` for every node reached within the bound.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    pub distances: HashMap<Arc<str>, (f64, Option<Arc<str>>)>,
}

impl TraversalResult {
    pub fn distance_of(&self, path: &str) -> Option<f64> {
        self.distances.get(path).map(|(d, _)| *d)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.distances.contains_key(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    dist: f64,
    node_idx: usize,
}

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the smallest distance
        // first; ties broken by the lower node handle for determinism.
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_idx.cmp(&self.node_idx).reverse())
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Assigns every path a stable, deterministic integer handle by sorted
/// string order, so that "ties broken by lower target handle" has a
/// concrete, reproducible meaning independent of hash-map iteration order.
struct HandleTable {
    by_index: Vec<Arc<str>>,
    by_path: HashMap<Arc<str>, usize>,
}

impl HandleTable {
    fn build(graph: &GraphStore, source: &str) -> Self {
        let mut names: Vec<Arc<str>> = vec![Arc::from(source)];
        graph.with_out_adjacency(|out| {
            for (node, edges) in out {
                names.push(Arc::clone(node));
                for e in edges {
                    names.push(Arc::clone(&e.to));
                }
            }
        });
        names.sort();
        names.dedup();
        let by_path: HashMap<Arc<str>, usize> =
            names.iter().enumerate().map(|(i, n)| (Arc::clone(n), i)).collect();
        Self { by_index: names, by_path }
    }

    fn handle(&mut self, path: &Arc<str>) -> usize {
        if let Some(&idx) = self.by_path.get(path) {
            return idx;
        }
        let idx = self.by_index.len();
        self.by_index.push(Arc::clone(path));
        self.by_path.insert(Arc::clone(path), idx);
        idx
    }

    fn path_of(&self, idx: usize) -> Arc<str> {
        Arc::clone(&self.by_index[idx])
    }
}

/// Computes single-source shortest paths up to distance `bound`, over
/// non-negative edge weights, using a "frontier reduction" partitioning:
/// the frontier is divided into `block_size` distance-range blocks; each
/// block is drained with its own small local heap before the traversal
/// advances to the next (higher-distance) block, so no single global heap
/// ever holds the whole discovered frontier at once. Because a block is
/// only advanced past once every node placed in it has been finally
/// settled, and a non-negative-weight relaxation can only push a neighbor
/// into the same block or a later one, the distances produced are
/// identical to a textbook Dijkstra's — this is the property exercised by
/// the Dijkstra cross-check test below.
pub fn traverse_bounded(graph: &GraphStore, source: &str, bound: f64) -> Result<TraversalResult, GraphError> {
    traverse_bounded_with_config(graph, source, bound, &FrontierConfig::default())
}

/// As [`traverse_bounded`], but with an explicit [`FrontierConfig`]
/// instead of the default block count.
pub fn traverse_bounded_with_config(
    graph: &GraphStore,
    source: &str,
    bound: f64,
    config: &FrontierConfig,
) -> Result<TraversalResult, GraphError> {
    if !graph.has_node(source) {
        return Err(GraphError::UnknownSource(source.to_string()));
    }
    let mut handles = HandleTable::build(graph, source);
    let source_idx = handles.handle(&Arc::from(source));

    let block_count = config.block_size.max(1);
    let delta = (bound / block_count as f64).max(1e-9);
    let mut blocks: Vec<BinaryHeap<HeapEntry>> = (0..=block_count).map(|_| BinaryHeap::new()).collect();

    let mut dist: HashMap<usize, f64> = HashMap::new();
    let mut pred: HashMap<usize, usize> = HashMap::new();
    let mut settled: Vec<bool> = Vec::new();

    dist.insert(source_idx, 0.0);
    blocks[0].push(HeapEntry { dist: 0.0, node_idx: source_idx });

    let mut block_idx = 0usize;
    while block_idx <= block_count {
        while let Some(HeapEntry { dist: d, node_idx }) = blocks[block_idx].pop() {
            if node_idx >= settled.len() {
                settled.resize(node_idx + 1, false);
            }
            if settled[node_idx] {
                continue;
            }
            if let Some(&best) = dist.get(&node_idx) {
                if d > best {
                    continue; // stale heap entry for a node relaxed to a better distance since
                }
            }
            settled[node_idx] = true;

            let path_name = handles.path_of(node_idx);
            let edges: Vec<Edge> = graph.neighbors_out(&path_name);
            // Deterministic relaxation order: adjacency insertion order is
            // preserved by the store, then ties are broken on pop by handle.
            for edge in edges {
                let to_idx = handles.handle(&edge.to);
                let candidate = d + edge.weight;
                if candidate > bound {
                    continue;
                }
                let better = match dist.get(&to_idx) {
                    Some(&existing) => candidate < existing,
                    None => true,
                };
                if better {
                    dist.insert(to_idx, candidate);
                    pred.insert(to_idx, node_idx);
                    let target_block = ((candidate / delta) as usize).min(block_count);
                    blocks[target_block].push(HeapEntry { dist: candidate, node_idx: to_idx });
                }
            }
        }
        block_idx += 1;
    }

    let mut distances = HashMap::new();
    for (&idx, &d) in dist.iter() {
        if d > bound {
            continue;
        }
        let predecessor = pred.get(&idx).map(|&p| handles.path_of(p));
        distances.insert(handles.path_of(idx), (d, predecessor));
    }
    Ok(TraversalResult { distances })
}

/// Simultaneous forward/backward Dijkstra search, terminating once the two
/// frontiers meet, used for single-pair shortest path.
pub fn shortest_path_bidirectional(
    graph: &GraphStore,
    source: &str,
    target: &str,
    bound: f64,
) -> Result<Option<(f64, Vec<Arc<str>>)>, GraphError> {
    if !graph.has_node(source) {
        return Err(GraphError::UnknownSource(source.to_string()));
    }
    if source == target {
        return Ok(Some((0.0, vec![Arc::from(source)])));
    }

    let mut dist_f: HashMap<Arc<str>, f64> = HashMap::new();
    let mut dist_b: HashMap<Arc<str>, f64> = HashMap::new();
    let mut pred_f: HashMap<Arc<str>, Arc<str>> = HashMap::new();
    let mut pred_b: HashMap<Arc<str>, Arc<str>> = HashMap::new();
    let mut settled_f: HashMap<Arc<str>, bool> = HashMap::new();
    let mut settled_b: HashMap<Arc<str>, bool> = HashMap::new();

    let mut heap_f: BinaryHeap<(std::cmp::Reverse<OrderedDist>, Arc<str>)> = BinaryHeap::new();
    let mut heap_b: BinaryHeap<(std::cmp::Reverse<OrderedDist>, Arc<str>)> = BinaryHeap::new();

    dist_f.insert(Arc::from(source), 0.0);
    dist_b.insert(Arc::from(target), 0.0);
    heap_f.push((std::cmp::Reverse(OrderedDist(0.0)), Arc::from(source)));
    heap_b.push((std::cmp::Reverse(OrderedDist(0.0)), Arc::from(target)));

    let mut best_mu = f64::INFINITY;
    let mut meeting: Option<Arc<str>> = None;

    loop {
        let top_f = heap_f.peek().map(|(d, _)| d.0 .0);
        let top_b = heap_b.peek().map(|(d, _)| d.0 .0);
        match (top_f, top_b) {
            (None, None) => break,
            _ => {}
        }
        if let Some(tf) = top_f {
            if let Some(tb) = top_b {
                if tf + tb >= best_mu {
                    break;
                }
            }
        }

        // Alternate expansion, forward first when tied/available.
        let expand_forward = match (top_f, top_b) {
            (Some(tf), Some(tb)) => tf <= tb,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        if expand_forward {
            if let Some((std::cmp::Reverse(OrderedDist(d)), node)) = heap_f.pop() {
                if *settled_f.get(&node).unwrap_or(&false) || d > bound {
                    continue;
                }
                settled_f.insert(Arc::clone(&node), true);
                if *settled_b.get(&node).unwrap_or(&false) {
                    let candidate = d + dist_b[&node];
                    if candidate < best_mu {
                        best_mu = candidate;
                        meeting = Some(Arc::clone(&node));
                    }
                }
                for edge in graph.neighbors_out(&node) {
                    let candidate = d + edge.weight;
                    if candidate > bound {
                        continue;
                    }
                    let better = dist_f.get(&edge.to).map(|&e| candidate < e).unwrap_or(true);
                    if better {
                        dist_f.insert(Arc::clone(&edge.to), candidate);
                        pred_f.insert(Arc::clone(&edge.to), Arc::clone(&node));
                        heap_f.push((std::cmp::Reverse(OrderedDist(candidate)), edge.to));
                    }
                }
            } else {
                break;
            }
        } else if let Some((std::cmp::Reverse(OrderedDist(d)), node)) = heap_b.pop() {
            if *settled_b.get(&node).unwrap_or(&false) || d > bound {
                continue;
            }
            settled_b.insert(Arc::clone(&node), true);
            if *settled_f.get(&node).unwrap_or(&false) {
                let candidate = d + dist_f[&node];
                if candidate < best_mu {
                    best_mu = candidate;
                    meeting = Some(Arc::clone(&node));
                }
            }
            for edge in graph.neighbors_in(&node) {
                let candidate = d + edge.weight;
                if candidate > bound {
                    continue;
                }
                let better = dist_b.get(&edge.from).map(|&e| candidate < e).unwrap_or(true);
                if better {
                    dist_b.insert(Arc::clone(&edge.from), candidate);
                    pred_b.insert(Arc::clone(&edge.from), Arc::clone(&node));
                    heap_b.push((std::cmp::Reverse(OrderedDist(candidate)), edge.from));
                }
            }
        } else {
            break;
        }
    }

    let Some(meet) = meeting else {
        return Ok(None);
    };

    // Reconstruct: source -> ... -> meet via pred_f, meet -> ... -> target via pred_b.
    let mut forward_path = vec![Arc::clone(&meet)];
    let mut cursor = meet.clone();
    while let Some(p) = pred_f.get(&cursor) {
        forward_path.push(Arc::clone(p));
        cursor = Arc::clone(p);
    }
    forward_path.reverse();

    let mut cursor = meet;
    let mut backward_tail = Vec::new();
    while let Some(p) = pred_b.get(&cursor) {
        backward_tail.push(Arc::clone(p));
        cursor = Arc::clone(p);
    }
    forward_path.extend(backward_tail);

    Ok(Some((best_mu, forward_path)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedDist(f64);
impl Eq for OrderedDist {}
impl Ord for OrderedDist {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for OrderedDist {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Convenience wrapper returning the full path, not just its distance —
/// every pathfinding consumer in the corpus (`pathfinding_benchmark.rs`)
/// wants the path, not a bare number.
pub fn shortest_path(
    graph: &GraphStore,
    source: &str,
    target: &str,
    bound: f64,
) -> Result<Option<(f64, Vec<Arc<str>>)>, GraphError> {
    shortest_path_bidirectional(graph, source, target, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map as JsonMap;

    fn build_s3_graph() -> GraphStore {
        let g = GraphStore::new(agrama_temporal::PathPolicy::default());
        g.add_edge("tests/a", "tests/b", "edge", 1.0, JsonMap::new()).unwrap();
        g.add_edge("tests/b", "tests/c", "edge", 1.0, JsonMap::new()).unwrap();
        g.add_edge("tests/a", "tests/c", "edge", 3.0, JsonMap::new()).unwrap();
        g.add_edge("tests/c", "tests/d", "edge", 1.0, JsonMap::new()).unwrap();
        g.add_edge("tests/d", "tests/e", "edge", 10.0, JsonMap::new()).unwrap();
        g
    }

    #[test]
    fn s3_bounded_traversal_correctness() {
        let g = build_s3_graph();
        let result = traverse_bounded(&g, "tests/a", 3.0).unwrap();

        assert_eq!(result.distance_of("tests/a"), Some(0.0));
        assert_eq!(result.distance_of("tests/b"), Some(1.0));
        assert_eq!(result.distance_of("tests/c"), Some(2.0));
        assert_eq!(result.distance_of("tests/d"), Some(3.0));
        assert!(!result.contains("tests/e"));
    }

    #[test]
    fn bound_zero_returns_only_source() {
        let g = build_s3_graph();
        let result = traverse_bounded(&g, "tests/a", 0.0).unwrap();
        assert_eq!(result.distances.len(), 1);
        assert_eq!(result.distance_of("tests/a"), Some(0.0));
    }

    #[test]
    fn matches_textbook_dijkstra_on_random_graphs() {
        use std::collections::BTreeMap;

        fn dijkstra_reference(
            adjacency: &BTreeMap<&str, Vec<(&str, f64)>>,
            source: &str,
            bound: f64,
        ) -> BTreeMap<String, f64> {
            let mut dist: BTreeMap<&str, f64> = BTreeMap::new();
            let mut heap = BinaryHeap::new();
            dist.insert(source, 0.0);
            heap.push((std::cmp::Reverse(OrderedDist(0.0)), source));
            let mut out = BTreeMap::new();
            while let Some((std::cmp::Reverse(OrderedDist(d)), node)) = heap.pop() {
                if d > *dist.get(node).unwrap_or(&f64::INFINITY) {
                    continue;
                }
                if d <= bound {
                    out.insert(node.to_string(), d);
                }
                if let Some(edges) = adjacency.get(node) {
                    for &(to, w) in edges {
                        let cand = d + w;
                        if cand > bound {
                            continue;
                        }
                        if cand < *dist.get(to).unwrap_or(&f64::INFINITY) {
                            dist.insert(to, cand);
                            heap.push((std::cmp::Reverse(OrderedDist(cand)), to));
                        }
                    }
                }
            }
            out
        }

        let g = GraphStore::new(agrama_temporal::PathPolicy::default());
        let edges: &[(&str, &str, f64)] = &[
            ("tests/a", "tests/b", 2.0),
            ("tests/a", "tests/c", 5.0),
            ("tests/b", "tests/c", 1.0),
            ("tests/b", "tests/d", 7.0),
            ("tests/c", "tests/d", 1.0),
            ("tests/d", "tests/e", 2.0),
            ("tests/c", "tests/e", 9.0),
        ];
        let mut reference: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();
        for &(from, to, w) in edges {
            g.add_edge(from, to, "e", w, JsonMap::new()).unwrap();
            reference.entry(from).or_default().push((to, w));
        }

        let bound = 6.0;
        let expected = dijkstra_reference(&reference, "tests/a", bound);
        let actual = traverse_bounded(&g, "tests/a", bound).unwrap();

        assert_eq!(actual.distances.len(), expected.len());
        for (path, dist) in &expected {
            assert_eq!(actual.distance_of(path), Some(*dist));
        }
    }

    #[test]
    fn bidirectional_shortest_path_round_trips() {
        let g = build_s3_graph();
        let (dist, path) = shortest_path(&g, "tests/a", "tests/d", 10.0).unwrap().unwrap();
        assert_eq!(dist, 3.0);
        assert_eq!(path.first().map(|p| &**p), Some("tests/a"));
        assert_eq!(path.last().map(|p| &**p), Some("tests/d"));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let g = GraphStore::new(agrama_temporal::PathPolicy::default());
        assert!(matches!(
            traverse_bounded(&g, "tests/missing", 1.0),
            Err(GraphError::UnknownSource(_))
        ));
    }

    use proptest::prelude::*;

    fn dijkstra_reference(adjacency: &BTreeMapType, source: usize, bound: f64) -> BTreeMapType2 {
        let mut dist: std::collections::BTreeMap<usize, f64> = std::collections::BTreeMap::new();
        let mut heap = BinaryHeap::new();
        dist.insert(source, 0.0);
        heap.push((std::cmp::Reverse(OrderedDist(0.0)), source));
        let mut out = std::collections::BTreeMap::new();
        while let Some((std::cmp::Reverse(OrderedDist(d)), node)) = heap.pop() {
            if d > *dist.get(&node).unwrap_or(&f64::INFINITY) {
                continue;
            }
            if d <= bound {
                out.insert(node, d);
            }
            if let Some(edges) = adjacency.get(&node) {
                for &(to, w) in edges {
                    let cand = d + w;
                    if cand > bound {
                        continue;
                    }
                    if cand < *dist.get(&to).unwrap_or(&f64::INFINITY) {
                        dist.insert(to, cand);
                        heap.push((std::cmp::Reverse(OrderedDist(cand)), to));
                    }
                }
            }
        }
        out
    }

    type BTreeMapType = std::collections::BTreeMap<usize, Vec<(usize, f64)>>;
    type BTreeMapType2 = std::collections::BTreeMap<usize, f64>;

    proptest::proptest! {
        /// Property 3: on random non-negative-weight graphs, the
        /// frontier-reduction traversal's distance map, restricted to the
        /// bound, is identical to a textbook Dijkstra's.
        #[test]
        fn matches_dijkstra_on_random_small_graphs(
            edges in proptest::collection::vec((0usize..8, 0usize..8, 0.1f64..9.0), 1..24),
            bound in 1.0f64..12.0,
        ) {
            let g = GraphStore::new(agrama_temporal::PathPolicy::default());
            let mut adjacency: BTreeMapType = std::collections::BTreeMap::new();
            for &(from, to, w) in &edges {
                if from == to {
                    continue;
                }
                let from_path = format!("tests/n{from}");
                let to_path = format!("tests/n{to}");
                g.add_edge(&from_path, &to_path, "e", w, JsonMap::new()).unwrap();
                adjacency.entry(from).or_default().push((to, w));
            }

            let expected = dijkstra_reference(&adjacency, 0, bound);
            let actual = traverse_bounded(&g, "tests/n0", bound).unwrap();

            prop_assert_eq!(actual.distances.len(), expected.len());
            for (&node, &dist) in &expected {
                let got = actual.distance_of(&format!("tests/n{node}"));
                prop_assert!(got.is_some());
                prop_assert!((got.unwrap() - dist).abs() < 1e-9);
            }
        }
    }
}
