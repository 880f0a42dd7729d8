use std::collections::{HashMap, HashSet};

use agrama_graph::{traverse_bounded_with_config, FrontierConfig, GraphStore};
use agrama_lexical::LexicalIndex;
use agrama_semantic::HnswIndex;

use crate::error::FusionError;
use crate::types::{FusionParams, FusionRequest};

/// Result of a fused query: the ranked, weight-blended path list plus any
/// per-backend warnings.
#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub results: Vec<(String, f64)>,
    pub warnings: Vec<String>,
}

/// Divides every score by the maximum in the set, yielding values in
/// `[0, 1]`. An empty or all-zero set normalizes to "no contribution":
/// if the max is 0 the backend contributes nothing.
fn normalize_by_max(results: Vec<(String, f64)>) -> HashMap<String, f64> {
    let max = results.iter().fold(0.0_f64, |acc, (_, s)| acc.max(*s));
    if max <= 0.0 {
        return HashMap::new();
    }
    results.into_iter().map(|(path, score)| (path, score / max)).collect()
}

/// Dispatches the three backends concurrently (each on its own scoped
/// thread, joined before returning — a fixed 3-way fan-out, not a
/// data-parallel map, so `std::thread::scope` reads more directly than
/// `rayon::join`), normalizes each backend's raw scores, and returns the
/// weighted blend sorted by combined score.
///
/// `vector`'s raw semantic score is `1 / (1 + distance)` — monotonically
/// decreasing in distance like every other "closer is better" metric here,
/// which then goes through the same per-backend max-normalization as the
/// lexical axis. The graph axis's score formula is already bounded to
/// `[0, 1]` by construction (`1 - distance/B`, clamped), so it is used
/// directly rather than re-normalized by its own per-query max — doing so
/// would distort a formula that's already pinned to a fixed scale (see
/// DESIGN.md).
pub fn fuse(
    lexical: &LexicalIndex,
    semantic: &HnswIndex,
    graph: &GraphStore,
    request: &FusionRequest,
    params: &FusionParams,
) -> Result<FusionOutcome, FusionError> {
    if request.text.is_none() && request.vector.is_none() && request.seeds.is_empty() {
        return Err(FusionError::AllBackendsFailed);
    }

    let mut warnings = Vec::new();
    let mut lexical_scores: HashMap<String, f64> = HashMap::new();
    let mut semantic_scores: HashMap<String, f64> = HashMap::new();
    let mut graph_scores: HashMap<String, f64> = HashMap::new();
    let mut graph_seed_succeeded = request.seeds.is_empty();

    std::thread::scope(|scope| {
        let lex_handle = request
            .text
            .as_deref()
            .map(|text| scope.spawn(move || lexical.query(text, params.cap_lexical)));

        let sem_handle = request.vector.as_deref().map(|vector| {
            scope.spawn(move || semantic.search(vector, params.cap_semantic, request.effective_dim))
        });

        let graph_handle = (!request.seeds.is_empty()).then(|| {
            scope.spawn(|| {
                let mut combined: HashMap<String, f64> = HashMap::new();
                let mut any_ok = false;
                let frontier_config = FrontierConfig {
                    block_size: params.graph_block_size,
                    ..FrontierConfig::default()
                };
                for seed in &request.seeds {
                    if let Ok(result) = traverse_bounded_with_config(graph, seed, params.graph_bound, &frontier_config) {
                        any_ok = true;
                        for (path, (dist, _)) in result.distances {
                            let score = (1.0 - dist / params.graph_bound).clamp(0.0, 1.0);
                            let entry = combined.entry(path.to_string()).or_insert(0.0);
                            if score > *entry {
                                *entry = score;
                            }
                        }
                    }
                }
                (combined, any_ok)
            })
        });

        if let Some(h) = lex_handle {
            match h.join().expect("lexical query thread panicked") {
                Ok(results) => lexical_scores = normalize_by_max(results),
                Err(e) => warnings.push(format!("lexical backend unavailable: {e}")),
            }
        }
        if let Some(h) = sem_handle {
            match h.join().expect("semantic query thread panicked") {
                Ok(results) => {
                    let raw: Vec<(String, f64)> = results
                        .into_iter()
                        .map(|(path, dist)| (path.to_string(), 1.0 / (1.0 + dist)))
                        .collect();
                    semantic_scores = normalize_by_max(raw);
                }
                Err(e) => warnings.push(format!("semantic backend unavailable: {e}")),
            }
        }
        if let Some(h) = graph_handle {
            let (combined, any_ok) = h.join().expect("graph traversal thread panicked");
            graph_scores = combined;
            graph_seed_succeeded = any_ok;
        }
    });

    if !graph_seed_succeeded {
        warnings.push("graph backend unavailable: no seed was reachable".to_string());
    }

    if lexical_scores.is_empty() && semantic_scores.is_empty() && graph_scores.is_empty() {
        return Err(FusionError::AllBackendsFailed);
    }

    let mut paths: HashSet<String> = HashSet::new();
    paths.extend(lexical_scores.keys().cloned());
    paths.extend(semantic_scores.keys().cloned());
    paths.extend(graph_scores.keys().cloned());

    let mut combined: Vec<(String, f64)> = paths
        .into_iter()
        .map(|path| {
            let score = params.weights.lexical * lexical_scores.get(&path).copied().unwrap_or(0.0)
                + params.weights.semantic * semantic_scores.get(&path).copied().unwrap_or(0.0)
                + params.weights.graph * graph_scores.get(&path).copied().unwrap_or(0.0);
            (path, score)
        })
        .filter(|(_, score)| params.min_score.map_or(true, |min| *score >= min))
        .collect();

    combined.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
    combined.truncate(params.limit);

    Ok(FusionOutcome { results: combined, warnings })
}
