use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use agrama_fusion::{fuse, FusionParams, FusionRequest};
use agrama_graph::{shortest_path, traverse_bounded_with_config, GraphStore};
use agrama_lexical::LexicalIndex;
use agrama_pool::{Arena, PoolManager};
use agrama_semantic::HnswIndex;
use agrama_temporal::TemporalStore;
use chrono::Utc;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::config::Config;
use crate::crdt::CrdtStore;
use crate::error::EngineError;
use crate::events::{EventBus, EventFilter, EventRecord, EventStatus};
use crate::fingerprint::fingerprint;
use crate::session::Identity;
use crate::transform::{TransformInput, TransformRegistry};
use crate::types::{
    EdgeSummary, HistoryEntry, LinkOutcome, LinkParams, RetrieveOutcome, RetrieveParams,
    SearchMode, SearchOutcome, SearchParams, StoreOutcome, StoreParams, TransformOutcome,
    TransformParams,
};

/// A cancellation signal plus deadline, threaded into every backend call
/// that has a safe checkpoint. `Arc<AtomicBool>` rather than a channel,
/// cheap to clone and check from any thread.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The aggregate owning every backend plus the ambient engine state: event
/// bus, transform registry, CRDT store, and the shared pool manager. A
/// thin primitive-execution engine: it validates agent requests, routes
/// them to the backends, and emits observability events.
pub struct Core {
    config: Config,
    pools: Arc<PoolManager>,
    pub(crate) temporal: TemporalStore,
    pub(crate) semantic: HnswIndex,
    pub(crate) graph: GraphStore,
    pub(crate) lexical: LexicalIndex,
    events: EventBus,
    transforms: TransformRegistry,
    crdt: CrdtStore,
}

impl Core {
    pub fn new(config: Config) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(EngineError::InvalidInput)?;
        let pools = Arc::new(PoolManager::new(config.pool_sizes(), config.arena_size));
        Ok(Self {
            temporal: TemporalStore::new(config.path_policy()),
            semantic: HnswIndex::new(config.hnsw_config()),
            graph: GraphStore::new(config.path_policy()),
            lexical: LexicalIndex::new(config.bm25_config()),
            events: EventBus::default(),
            transforms: TransformRegistry::default(),
            crdt: CrdtStore::new(),
            pools,
            config,
        })
    }

    /// Assembles a `Core` from already-built backends (used by
    /// [`crate::snapshot`]'s `restore`, which constructs each backend from
    /// its own snapshot rather than starting empty via [`Core::new`]).
    pub(crate) fn from_parts(
        config: Config,
        pools: Arc<PoolManager>,
        temporal: TemporalStore,
        semantic: HnswIndex,
        graph: GraphStore,
        lexical: LexicalIndex,
    ) -> Self {
        Self {
            config,
            pools,
            temporal,
            semantic,
            graph,
            lexical,
            events: EventBus::default(),
            transforms: TransformRegistry::default(),
            crdt: CrdtStore::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self, filter: EventFilter) -> crossbeam::channel::Receiver<EventRecord> {
        self.events.subscribe(filter)
    }

    fn arena(&self) -> Arena {
        self.pools.acquire_arena()
    }

    fn emit(
        &self,
        primitive: &'static str,
        identity: &Identity,
        fingerprint: String,
        start_us: i64,
        status: EventStatus,
        warnings: Vec<String>,
    ) {
        self.events.publish(EventRecord {
            sequence: self.events.next_sequence(),
            primitive,
            agent_id: identity.agent_id.clone(),
            session_id: identity.session_id.clone(),
            parameter_fingerprint: fingerprint,
            start_us,
            end_us: Utc::now().timestamp_micros(),
            status,
            warnings,
        });
    }

    /// Writes `path`'s content via the temporal store and, staged on top of
    /// it, optionally the lexical and semantic indices — all or nothing
    ///. Staging order is fixed: temporal, then
    /// lexical, then semantic; a dimension mismatch on the semantic stage is
    /// caught before the temporal write lands by validating embedding
    /// length up front, so the only way staging partially fails after the
    /// temporal commit is a defect in an already-validated index call (an
    /// `internal_error`, not a recoverable one).
    #[tracing::instrument(skip(self, params, identity, cancel), fields(path = %params.path))]
    pub fn store(
        &self,
        identity: &Identity,
        params: StoreParams,
        cancel: &CancelToken,
    ) -> Result<StoreOutcome, EngineError> {
        let start_us = Utc::now().timestamp_micros();
        let fp = fingerprint(&serde_json::json!({
            "path": params.path,
            "metadata": params.metadata,
            "has_embedding": params.embedding.is_some(),
            "has_tokens": params.tokens.is_some(),
            "crdt": params.crdt,
        }));

        let result = self.store_inner(params, cancel);
        match &result {
            Ok(outcome) => self.emit(
                "store",
                identity,
                fp,
                start_us,
                EventStatus::Success {
                    summary: serde_json::json!({ "path": outcome.path, "history_len": outcome.history_len }),
                },
                Vec::new(),
            ),
            Err(EngineError::Cancelled) => self.emit("store", identity, fp, start_us, EventStatus::Cancelled, Vec::new()),
            Err(e) => self.emit(
                "store",
                identity,
                fp,
                start_us,
                EventStatus::Failed { kind: e.kind(), message: e.to_string() },
                Vec::new(),
            ),
        }
        result
    }

    fn store_inner(&self, params: StoreParams, cancel: &CancelToken) -> Result<StoreOutcome, EngineError> {
        if let Some(embedding) = &params.embedding {
            if embedding.len() != self.config.embedding_dim {
                return Err(EngineError::DimensionMismatch {
                    expected: self.config.embedding_dim,
                    got: embedding.len(),
                });
            }
        }
        if cancel.is_triggered() {
            return Err(EngineError::Cancelled);
        }

        let content = if params.crdt {
            let participant = "engine-default";
            let text = String::from_utf8(params.content.clone())
                .map_err(|_| EngineError::InvalidInput("crdt-managed content must be valid UTF-8".into()))?;
            let merged = self.crdt.apply_edit(&params.path, participant, &text);
            merged.into_bytes()
        } else {
            params.content.clone()
        };

        // The only cancellation checkpoint sits before this line: once the
        // temporal write commits there is no delete to roll it back with,
        // so a cancel observed after this point would otherwise leave a
        // partial mutation behind. Everything from here on always runs to
        // completion.
        self.temporal.put(&params.path, content.clone())?;

        let mut indexed_lexical = false;
        if let Some(tokens) = &params.tokens {
            self.lexical.index(&params.path, tokens);
            indexed_lexical = true;
        }

        let mut indexed_semantic = false;
        if let Some(embedding) = params.embedding {
            self.semantic.insert(&params.path, embedding)?;
            indexed_semantic = true;
        }

        let history_len = self.temporal.history_len(&params.path)?;
        Ok(StoreOutcome {
            path: params.path,
            history_len,
            indexed_lexical,
            indexed_semantic,
        })
    }

    #[tracing::instrument(skip(self, params, identity), fields(path = %params.path))]
    pub fn retrieve(&self, identity: &Identity, params: RetrieveParams) -> Result<RetrieveOutcome, EngineError> {
        let start_us = Utc::now().timestamp_micros();
        let fp = fingerprint(&serde_json::json!({
            "path": params.path,
            "history_limit": params.history_limit,
            "include_neighbors": params.include_neighbors,
        }));

        let result = self.retrieve_inner(params);
        match &result {
            Ok(outcome) => self.emit(
                "retrieve",
                identity,
                fp,
                start_us,
                EventStatus::Success {
                    summary: serde_json::json!({ "path": outcome.path, "history_entries": outcome.history.len() }),
                },
                Vec::new(),
            ),
            Err(e) => self.emit(
                "retrieve",
                identity,
                fp,
                start_us,
                EventStatus::Failed { kind: e.kind(), message: e.to_string() },
                Vec::new(),
            ),
        }
        result
    }

    fn retrieve_inner(&self, params: RetrieveParams) -> Result<RetrieveOutcome, EngineError> {
        let content = self.temporal.get(&params.path)?;
        let history = self
            .temporal
            .history(&params.path, params.history_limit.unwrap_or(1))?
            .into_iter()
            .map(|r| HistoryEntry { timestamp: r.timestamp, content: r.content.to_vec() })
            .collect();

        let (neighbors_out, neighbors_in) = if params.include_neighbors {
            let out = self
                .graph
                .neighbors_out(&params.path)
                .into_iter()
                .map(edge_summary)
                .collect();
            let inn = self
                .graph
                .neighbors_in(&params.path)
                .into_iter()
                .map(edge_summary)
                .collect();
            (out, inn)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(RetrieveOutcome {
            path: params.path,
            content: content.to_vec(),
            history,
            neighbors_out,
            neighbors_in,
        })
    }

    #[tracing::instrument(skip(self, params, identity))]
    pub fn search(&self, identity: &Identity, params: SearchParams) -> Result<SearchOutcome, EngineError> {
        let start_us = Utc::now().timestamp_micros();
        let fp = fingerprint(&serde_json::json!({
            "mode": params.mode,
            "text": params.text,
            "has_vector": params.vector.is_some(),
            "seeds": params.seeds,
            "limit": params.limit,
        }));

        let result = self.search_inner(params);
        match &result {
            Ok(outcome) => self.emit(
                "search",
                identity,
                fp,
                start_us,
                EventStatus::Success {
                    summary: serde_json::json!({ "result_count": outcome.results.len() }),
                },
                outcome.warnings.clone(),
            ),
            Err(e) => self.emit(
                "search",
                identity,
                fp,
                start_us,
                EventStatus::Failed { kind: e.kind(), message: e.to_string() },
                Vec::new(),
            ),
        }
        result
    }

    fn search_inner(&self, params: SearchParams) -> Result<SearchOutcome, EngineError> {
        let mode = params.mode.unwrap_or(SearchMode::Hybrid);
        match mode {
            SearchMode::Lexical => {
                let text = params
                    .text
                    .ok_or_else(|| EngineError::InvalidInput("lexical search requires `text`".into()))?;
                let results = self.lexical.query(&text, params.limit)?;
                Ok(SearchOutcome { results, warnings: Vec::new() })
            }
            SearchMode::Semantic => {
                let vector = params
                    .vector
                    .ok_or_else(|| EngineError::InvalidInput("semantic search requires `vector`".into()))?;
                let results = self
                    .semantic
                    .search(&vector, params.limit, params.effective_dim)?
                    .into_iter()
                    .map(|(path, dist)| (path.to_string(), dist))
                    .collect();
                Ok(SearchOutcome { results, warnings: Vec::new() })
            }
            SearchMode::Graph => {
                let seed = params
                    .seeds
                    .first()
                    .ok_or_else(|| EngineError::InvalidInput("graph search requires at least one seed".into()))?;
                let bound = params.graph_bound.unwrap_or(self.config.fre_max_bound);
                let traversal = traverse_bounded_with_config(&self.graph, seed, bound, &self.config.frontier_config())?;
                let mut results: Vec<(String, f64)> = traversal
                    .distances
                    .into_iter()
                    .map(|(path, (dist, _))| (path.to_string(), dist))
                    .collect();
                results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
                results.truncate(params.limit);
                Ok(SearchOutcome { results, warnings: Vec::new() })
            }
            SearchMode::Hybrid => {
                let request = FusionRequest {
                    text: params.text,
                    vector: params.vector,
                    effective_dim: params.effective_dim,
                    seeds: params.seeds,
                };
                let fusion_params = FusionParams {
                    weights: params.weights.unwrap_or_default(),
                    graph_bound: params.graph_bound.unwrap_or(self.config.fre_max_bound),
                    graph_block_size: self.config.fre_block_size,
                    limit: params.limit,
                    ..FusionParams::default()
                };
                let outcome = fuse(&self.lexical, &self.semantic, &self.graph, &request, &fusion_params)?;
                Ok(SearchOutcome { results: outcome.results, warnings: outcome.warnings })
            }
            SearchMode::Temporal => {
                let seed = params
                    .seeds
                    .first()
                    .ok_or_else(|| EngineError::InvalidInput("temporal search requires a path as its seed".into()))?;
                let history = self.temporal.history(seed, params.history_limit.unwrap_or(params.limit))?;
                let results = history
                    .into_iter()
                    .enumerate()
                    .map(|(i, record)| (format!("{seed}@{}", record.timestamp), -(i as f64)))
                    .collect();
                Ok(SearchOutcome { results, warnings: Vec::new() })
            }
        }
    }

    #[tracing::instrument(skip(self, params, identity), fields(from = %params.from, to = %params.to))]
    pub fn link(&self, identity: &Identity, params: LinkParams) -> Result<LinkOutcome, EngineError> {
        let start_us = Utc::now().timestamp_micros();
        let fp = fingerprint(&serde_json::json!({
            "from": params.from,
            "to": params.to,
            "kind": params.kind,
            "weight": params.weight,
        }));

        let result = self.link_inner(params);
        match &result {
            Ok(outcome) => self.emit(
                "link",
                identity,
                fp,
                start_us,
                EventStatus::Success {
                    summary: serde_json::json!({ "from": outcome.from, "to": outcome.to, "kind": outcome.kind }),
                },
                Vec::new(),
            ),
            Err(e) => self.emit(
                "link",
                identity,
                fp,
                start_us,
                EventStatus::Failed { kind: e.kind(), message: e.to_string() },
                Vec::new(),
            ),
        }
        result
    }

    fn link_inner(&self, params: LinkParams) -> Result<LinkOutcome, EngineError> {
        let weight = params.weight.unwrap_or(1.0);
        let attrs = params.attrs.unwrap_or_default();
        self.graph.add_edge(&params.from, &params.to, &params.kind, weight, attrs)?;
        Ok(LinkOutcome { from: params.from, to: params.to, kind: params.kind })
    }

    /// Single-pair shortest path, a convenience read that rides the same
    /// `GraphStore` the `link`/`search(mode: graph)` primitives use. Runs
    /// the bidirectional forward/backward search variant.
    pub fn shortest_path(
        &self,
        from: &str,
        to: &str,
        bound: f64,
    ) -> Result<Option<(f64, Vec<Arc<str>>)>, EngineError> {
        Ok(shortest_path(&self.graph, from, to, bound)?)
    }

    #[tracing::instrument(skip(self, params, identity), fields(operation = %params.operation))]
    pub fn transform(&self, identity: &Identity, params: TransformParams) -> Result<TransformOutcome, EngineError> {
        let start_us = Utc::now().timestamp_micros();
        let fp = fingerprint(&serde_json::json!({
            "operation": params.operation,
            "inputs": params.inputs,
            "params": params.params,
        }));

        let result = self.transform_inner(params);
        match &result {
            Ok(outcome) => self.emit(
                "transform",
                identity,
                fp,
                start_us,
                EventStatus::Success {
                    summary: serde_json::json!({ "path": outcome.path }),
                },
                Vec::new(),
            ),
            Err(e) => self.emit(
                "transform",
                identity,
                fp,
                start_us,
                EventStatus::Failed { kind: e.kind(), message: e.to_string() },
                Vec::new(),
            ),
        }
        result
    }

    fn transform_inner(&self, params: TransformParams) -> Result<TransformOutcome, EngineError> {
        let handler = self
            .transforms
            .get(&params.operation)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown transform operation '{}'", params.operation)))?;

        let mut inputs = Vec::with_capacity(params.inputs.len());
        for path in &params.inputs {
            let content = self.temporal.get(path)?;
            let history = self
                .temporal
                .history(path, params.history_limit)?
                .into_iter()
                .map(|r| (r.timestamp, r.content))
                .collect();
            inputs.push(TransformInput { path: path.clone(), content, history });
        }

        let arena = self.arena();
        let output = handler.run(&inputs, &params.params, &arena)?;

        let mut metadata: JsonMap<String, JsonValue> = output.metadata;
        metadata.insert("source_operation".to_string(), JsonValue::String(params.operation));
        Ok(TransformOutcome { path: output.path, content: output.content, metadata })
    }
}

fn edge_summary(edge: agrama_graph::Edge) -> EdgeSummary {
    EdgeSummary {
        from: edge.from.to_string(),
        to: edge.to.to_string(),
        kind: edge.kind.to_string(),
        weight: edge.weight,
    }
}
