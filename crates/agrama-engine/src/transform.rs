use std::collections::HashMap;
use std::sync::Arc;

use agrama_pool::Arena;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::EngineError;

/// One path's content plus its history, gathered by the engine before
/// dispatch so every transform handler stays a pure function over already
/// materialized data.
#[derive(Debug, Clone)]
pub struct TransformInput {
    pub path: String,
    pub content: Arc<[u8]>,
    /// Newest first, matching `TemporalStore::history`'s ordering.
    pub history: Vec<(i64, Arc<[u8]>)>,
}

/// What a handler hands back: a path (new or the same one, modified),
/// content, and metadata the engine may choose to store.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub path: String,
    pub content: Vec<u8>,
    pub metadata: JsonMap<String, JsonValue>,
}

/// A named, pure function over already-materialized store contents: given
/// the gathered inputs and caller-supplied parameters, produces a new or
/// modified entity. Handlers never touch the backends directly — the
/// engine gathers `TransformInput`s before dispatch and stores whatever
/// `TransformOutput` comes back, so a handler can't observe or mutate
/// anything outside what it was handed.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        inputs: &[TransformInput],
        params: &JsonValue,
        arena: &Arena,
    ) -> Result<TransformOutput, EngineError>;
}

/// A registry entry's fixed signature, so there is no
/// `register` method past construction.
pub struct TransformRegistry {
    handlers: HashMap<&'static str, Arc<dyn Transform>>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = Self { handlers: HashMap::new() };
        registry.install(Arc::new(SummarizeHistory));
        registry.install(Arc::new(MergePaths));
        registry.install(Arc::new(ExtractLinks));
        registry.install(Arc::new(Noop));
        registry
    }
}

impl TransformRegistry {
    fn install(&mut self, handler: Arc<dyn Transform>) {
        self.handlers.insert(handler.name(), handler);
    }

    /// Adds caller-supplied handlers on top of the built-in set. Still closed once construction finishes.
    pub fn with_extensions(mut self, extra: Vec<Arc<dyn Transform>>) -> Self {
        for handler in extra {
            self.install(handler);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

/// Reduces a path's change records to a single synthetic entity capturing
/// first/last/count.
struct SummarizeHistory;
impl Transform for SummarizeHistory {
    fn name(&self) -> &'static str {
        "summarize_history"
    }

    fn run(
        &self,
        inputs: &[TransformInput],
        _params: &JsonValue,
        _arena: &Arena,
    ) -> Result<TransformOutput, EngineError> {
        let input = inputs
            .first()
            .ok_or_else(|| EngineError::InvalidInput("summarize_history requires one input path".into()))?;

        let count = input.history.len();
        let first = input.history.last().map(|(_, c)| String::from_utf8_lossy(c).to_string());
        let last = input.history.first().map(|(_, c)| String::from_utf8_lossy(c).to_string());

        let summary = serde_json::json!({
            "path": input.path,
            "change_count": count,
            "first_content": first,
            "last_content": last,
        });

        let mut metadata = JsonMap::new();
        metadata.insert("transform".to_string(), JsonValue::String("summarize_history".into()));
        metadata.insert("source_path".to_string(), JsonValue::String(input.path.clone()));

        Ok(TransformOutput {
            path: format!("{}/summary", input.path),
            content: serde_json::to_vec(&summary).map_err(|e| EngineError::Internal(e.to_string()))?,
            metadata,
        })
    }
}

/// Concatenates two paths' content with a separator, recording both as
/// provenance in the result's metadata.
struct MergePaths;
impl Transform for MergePaths {
    fn name(&self) -> &'static str {
        "merge_paths"
    }

    fn run(
        &self,
        inputs: &[TransformInput],
        params: &JsonValue,
        _arena: &Arena,
    ) -> Result<TransformOutput, EngineError> {
        if inputs.len() != 2 {
            return Err(EngineError::InvalidInput("merge_paths requires exactly two input paths".into()));
        }
        let separator = params
            .get("separator")
            .and_then(JsonValue::as_str)
            .unwrap_or("\n---\n");

        let mut content = Vec::new();
        content.extend_from_slice(&inputs[0].content);
        content.extend_from_slice(separator.as_bytes());
        content.extend_from_slice(&inputs[1].content);

        let mut metadata = JsonMap::new();
        metadata.insert("transform".to_string(), JsonValue::String("merge_paths".into()));
        metadata.insert(
            "provenance".to_string(),
            JsonValue::Array(vec![
                JsonValue::String(inputs[0].path.clone()),
                JsonValue::String(inputs[1].path.clone()),
            ]),
        );

        Ok(TransformOutput {
            path: format!("{}+{}", inputs[0].path, inputs[1].path),
            content,
            metadata,
        })
    }
}

/// Scans a path's content for other known path strings and proposes
/// `link` calls without inserting them — a pure function per the
/// registry's contract.
struct ExtractLinks;
impl Transform for ExtractLinks {
    fn name(&self) -> &'static str {
        "extract_links"
    }

    fn run(
        &self,
        inputs: &[TransformInput],
        params: &JsonValue,
        _arena: &Arena,
    ) -> Result<TransformOutput, EngineError> {
        let input = inputs
            .first()
            .ok_or_else(|| EngineError::InvalidInput("extract_links requires one input path".into()))?;
        let known_paths: Vec<&str> = params
            .get("known_paths")
            .and_then(JsonValue::as_array)
            .map(|arr| arr.iter().filter_map(JsonValue::as_str).collect())
            .unwrap_or_default();

        let text = String::from_utf8_lossy(&input.content);
        let proposed: Vec<JsonValue> = known_paths
            .iter()
            .filter(|candidate| **candidate != input.path && text.contains(*candidate))
            .map(|candidate| {
                serde_json::json!({
                    "from": input.path,
                    "to": candidate,
                    "kind": "mentions",
                })
            })
            .collect();

        let mut metadata = JsonMap::new();
        metadata.insert("transform".to_string(), JsonValue::String("extract_links".into()));
        metadata.insert("proposed_links".to_string(), JsonValue::Array(proposed));

        Ok(TransformOutput {
            path: input.path.clone(),
            content: input.content.to_vec(),
            metadata,
        })
    }
}

/// Identity transform, useful for adapter conformance tests and as a
/// registry baseline.
struct Noop;
impl Transform for Noop {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn run(
        &self,
        inputs: &[TransformInput],
        _params: &JsonValue,
        _arena: &Arena,
    ) -> Result<TransformOutput, EngineError> {
        let input = inputs
            .first()
            .ok_or_else(|| EngineError::InvalidInput("noop requires one input path".into()))?;
        Ok(TransformOutput {
            path: input.path.clone(),
            content: input.content.to_vec(),
            metadata: JsonMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        agrama_pool::PoolManager::new(agrama_pool::PoolSizes::default(), 1 << 16).acquire_arena()
    }

    #[test]
    fn registry_has_all_four_built_ins() {
        let registry = TransformRegistry::default();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["extract_links", "merge_paths", "noop", "summarize_history"]);
    }

    #[test]
    fn summarize_history_captures_first_last_count() {
        let handler = registry_get("summarize_history");
        let input = TransformInput {
            path: "src/a".into(),
            content: Arc::from(b"three".as_slice()),
            history: vec![
                (3, Arc::from(b"three".as_slice())),
                (2, Arc::from(b"two".as_slice())),
                (1, Arc::from(b"one".as_slice())),
            ],
        };
        let out = handler.run(&[input], &JsonValue::Null, &arena()).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&out.content).unwrap();
        assert_eq!(parsed["change_count"], 3);
        assert_eq!(parsed["first_content"], "one");
        assert_eq!(parsed["last_content"], "three");
    }

    #[test]
    fn merge_paths_concatenates_with_provenance() {
        let handler = registry_get("merge_paths");
        let a = TransformInput { path: "src/a".into(), content: Arc::from(b"alpha".as_slice()), history: vec![] };
        let b = TransformInput { path: "src/b".into(), content: Arc::from(b"beta".as_slice()), history: vec![] };
        let out = handler.run(&[a, b], &JsonValue::Null, &arena()).unwrap();
        assert_eq!(String::from_utf8(out.content).unwrap(), "alpha\n---\nbeta");
        assert_eq!(out.metadata["provenance"], serde_json::json!(["src/a", "src/b"]));
    }

    #[test]
    fn extract_links_proposes_without_inserting() {
        let handler = registry_get("extract_links");
        let input = TransformInput {
            path: "src/a".into(),
            content: Arc::from(b"see also src/b for details".as_slice()),
            history: vec![],
        };
        let params = serde_json::json!({"known_paths": ["src/b", "src/c"]});
        let out = handler.run(&[input], &params, &arena()).unwrap();
        let proposed = out.metadata["proposed_links"].as_array().unwrap();
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0]["to"], "src/b");
    }

    #[test]
    fn noop_returns_input_unchanged() {
        let handler = registry_get("noop");
        let input = TransformInput { path: "src/a".into(), content: Arc::from(b"x".as_slice()), history: vec![] };
        let out = handler.run(&[input], &JsonValue::Null, &arena()).unwrap();
        assert_eq!(out.content, b"x");
    }

    fn registry_get(name: &str) -> Arc<dyn Transform> {
        TransformRegistry::default().get(name).unwrap()
    }
}
