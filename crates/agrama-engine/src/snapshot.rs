use std::io::{Read, Write};

use agrama_graph::GraphSnapshot;
use agrama_lexical::LexicalSnapshot;
use agrama_semantic::SemanticSnapshot;
use agrama_temporal::TemporalSnapshot;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::Core;
use crate::error::EngineError;

/// Bumped whenever the envelope's field layout changes in a way `bincode`
/// can't decode across, so `restore` can reject a snapshot from an
/// incompatible version instead of silently misinterpreting its bytes.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The complete logical state of a [`Core`]: every backend's snapshot,
/// wrapped with a version tag. CRDT replica state is deliberately excluded
/// — a restored `Core` has every path's materialized content (the only
/// thing `retrieve`/`history` observe), but a CRDT
/// path loses the per-participant edit history needed for a future
/// concurrent merge to stay order-independent. A document under active
/// collaborative editing should be re-seeded with a fresh `crdt: true`
/// store after restore rather than relying on snapshot/restore to carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    temporal: TemporalSnapshot,
    graph: GraphSnapshot,
    lexical: LexicalSnapshot,
    semantic: SemanticSnapshot,
}

impl Core {
    /// Serializes the complete backend state to `writer` as a versioned,
    /// self-describing `bincode` envelope.
    pub fn snapshot(&self, mut writer: impl Write) -> Result<(), EngineError> {
        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_FORMAT_VERSION,
            temporal: self.temporal.snapshot(),
            graph: self.graph.snapshot(),
            lexical: self.lexical.snapshot(),
            semantic: self.semantic.snapshot(),
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| EngineError::Internal(format!("snapshot serialization failed: {e}")))?;
        writer
            .write_all(&bytes)
            .map_err(|e| EngineError::Internal(format!("snapshot write failed: {e}")))?;
        Ok(())
    }

    /// Rebuilds a fresh `Core` from a prior `snapshot()`, re-validating
    /// every path and edge against `config`'s path policy exactly as the
    /// original inserts did (Testable Property 7: byte-identical
    /// `retrieve`/`history` outputs).
    pub fn restore(config: Config, mut reader: impl Read) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidInput)?;

        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| EngineError::Internal(format!("snapshot read failed: {e}")))?;
        let envelope: SnapshotEnvelope = bincode::deserialize(&bytes)
            .map_err(|e| EngineError::Internal(format!("snapshot deserialization failed: {e}")))?;
        if envelope.version != SNAPSHOT_FORMAT_VERSION {
            return Err(EngineError::InvalidInput(format!(
                "unsupported snapshot format version {} (expected {})",
                envelope.version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let temporal = agrama_temporal::TemporalStore::restore(config.path_policy(), envelope.temporal)?;
        let graph = agrama_graph::GraphStore::restore(config.path_policy(), envelope.graph)?;
        let lexical = agrama_lexical::LexicalIndex::restore(config.bm25_config(), envelope.lexical);
        let semantic = agrama_semantic::HnswIndex::restore(config.hnsw_config(), envelope.semantic)?;

        let pools = std::sync::Arc::new(agrama_pool::PoolManager::new(config.pool_sizes(), config.arena_size));
        Ok(Core::from_parts(config, pools, temporal, semantic, graph, lexical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CancelToken;
    use crate::session::Identity;
    use crate::types::{LinkParams, RetrieveParams, StoreParams};

    fn agent() -> Identity {
        Identity::agent("test-agent")
    }

    #[test]
    fn snapshot_then_restore_is_byte_identical_for_retrieve_and_history() {
        let config = Config { embedding_dim: 64, ..Config::default() };
        let original = Core::new(config.clone()).unwrap();

        original
            .store(
                &agent(),
                StoreParams {
                    path: "src/a".into(),
                    content: b"one".to_vec(),
                    tokens: Some("alpha beta".into()),
                    embedding: Some(vec![1.0; 64]),
                    ..Default::default()
                },
                &CancelToken::new(),
            )
            .unwrap();
        original
            .store(
                &agent(),
                StoreParams { path: "src/a".into(), content: b"two".to_vec(), ..Default::default() },
                &CancelToken::new(),
            )
            .unwrap();
        original
            .store(
                &agent(),
                StoreParams { path: "src/b".into(), content: b"hello".to_vec(), ..Default::default() },
                &CancelToken::new(),
            )
            .unwrap();
        original
            .link(&agent(), LinkParams { from: "src/a".into(), to: "src/b".into(), kind: "references".into(), weight: Some(1.0), attrs: None })
            .unwrap();

        let mut buf = Vec::new();
        original.snapshot(&mut buf).unwrap();

        let restored = Core::restore(config, &buf[..]).unwrap();

        let original_a = original.retrieve(&agent(), RetrieveParams { path: "src/a".into(), history_limit: Some(10), include_neighbors: true }).unwrap();
        let restored_a = restored.retrieve(&agent(), RetrieveParams { path: "src/a".into(), history_limit: Some(10), include_neighbors: true }).unwrap();
        assert_eq!(original_a.content, restored_a.content);
        assert_eq!(original_a.history.len(), restored_a.history.len());
        assert_eq!(original_a.neighbors_out.len(), restored_a.neighbors_out.len());

        let original_b = original.retrieve(&agent(), RetrieveParams { path: "src/b".into(), history_limit: Some(10), include_neighbors: false }).unwrap();
        let restored_b = restored.retrieve(&agent(), RetrieveParams { path: "src/b".into(), history_limit: Some(10), include_neighbors: false }).unwrap();
        assert_eq!(original_b.content, restored_b.content);
    }

    #[test]
    fn restore_rejects_mismatched_format_version() {
        let config = Config { embedding_dim: 64, ..Config::default() };
        let mut buf = Vec::new();
        let bad = SnapshotEnvelope {
            version: SNAPSHOT_FORMAT_VERSION + 1,
            temporal: TemporalSnapshot::default(),
            graph: GraphSnapshot::default(),
            lexical: LexicalSnapshot::default(),
            semantic: SemanticSnapshot::default(),
        };
        bincode::serialize_into(&mut buf, &bad).unwrap();
        let err = Core::restore(config, &buf[..]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
