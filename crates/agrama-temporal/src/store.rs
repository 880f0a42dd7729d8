use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::TemporalError;
use crate::path::{Path, PathPolicy};

/// An immutable `(timestamp, path, content)` triple. Change records are
/// never mutated or deleted once appended.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub path: Path,
    pub content: Arc<[u8]>,
    /// Microseconds since the Unix epoch. Non-decreasing within a path's
    /// history, strictly per insertion order.
    pub timestamp: i64,
}

struct PathEntry {
    history: Vec<ChangeRecord>,
}

impl PathEntry {
    fn current(&self) -> Arc<[u8]> {
        // Invariant: history is never empty once the entry exists (the
        // entry is created by the first `put`, which appends immediately).
        self.history
            .last()
            .expect("path entry invariant: history is never empty")
            .content
            .clone()
    }
}

/// Path → current content, and path → complete ordered change log.
///
/// Holds one `RwLock<PathEntry>` per path so that operations on unrelated
/// paths never block each other; within one path, `put` takes the write side and
/// `get`/`history` take the read side, giving the linearization guarantee
/// that a `retrieve` never observes a torn write.
pub struct TemporalStore {
    entries: DashMap<Path, RwLock<PathEntry>>,
    policy: PathPolicy,
}

impl TemporalStore {
    pub fn new(policy: PathPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Validates `raw_path`, then atomically replaces the path's current
    /// content and appends exactly one change record. Never partial: if
    /// validation fails, no state is touched.
    pub fn put(&self, raw_path: &str, content: Vec<u8>) -> Result<Path, TemporalError> {
        let path = Path::parse(raw_path, &self.policy)?;
        let now = Utc::now().timestamp_micros();

        let entry_lock = self
            .entries
            .entry(path.clone())
            .or_insert_with(|| RwLock::new(PathEntry { history: Vec::new() }));
        let mut entry = entry_lock.write();

        // Enforce non-decreasing timestamps even if the wall clock hasn't
        // advanced between two writes to the same path within a microsecond.
        let timestamp = match entry.history.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        entry.history.push(ChangeRecord {
            path: path.clone(),
            content: Arc::from(content),
            timestamp,
        });

        Ok(path)
    }

    pub fn get(&self, raw_path: &str) -> Result<Arc<[u8]>, TemporalError> {
        let path = Path::parse(raw_path, &self.policy)?;
        let entry_lock = self
            .entries
            .get(&path)
            .ok_or_else(|| TemporalError::NotFound(raw_path.to_string()))?;
        Ok(entry_lock.read().current())
    }

    /// Returns up to `limit` change records, newest first.
    pub fn history(&self, raw_path: &str, limit: usize) -> Result<Vec<ChangeRecord>, TemporalError> {
        let path = Path::parse(raw_path, &self.policy)?;
        let entry_lock = self
            .entries
            .get(&path)
            .ok_or_else(|| TemporalError::NotFound(raw_path.to_string()))?;
        let entry = entry_lock.read();
        Ok(entry
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn history_len(&self, raw_path: &str) -> Result<usize, TemporalError> {
        let path = Path::parse(raw_path, &self.policy)?;
        let entry_lock = self
            .entries
            .get(&path)
            .ok_or_else(|| TemporalError::NotFound(raw_path.to_string()))?;
        Ok(entry_lock.read().history.len())
    }

    pub fn contains(&self, raw_path: &str) -> bool {
        match Path::parse(raw_path, &self.policy) {
            Ok(path) => self.entries.contains_key(&path),
            Err(_) => false,
        }
    }

    pub fn path_count(&self) -> usize {
        self.entries.len()
    }

    /// Captures every path's complete history, oldest first per path, as a
    /// self-describing record. No anchor+delta compression: each change
    /// record's full content is stored verbatim, leaving that as a future
    /// extension point rather than part of the required contract.
    pub fn snapshot(&self) -> TemporalSnapshot {
        let mut paths = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            let history = entry
                .value()
                .read()
                .history
                .iter()
                .map(|r| ChangeRecordSnapshot {
                    content: r.content.to_vec(),
                    timestamp: r.timestamp,
                })
                .collect();
            paths.push((entry.key().as_str().to_string(), history));
        }
        TemporalSnapshot { paths }
    }

    /// Rebuilds a store from a prior `snapshot()`. Every `(path, history)`
    /// pair is re-validated against `policy`, so a snapshot produced under a
    /// looser policy can still be rejected by a stricter one rather than
    /// silently restoring invalid state.
    pub fn restore(policy: PathPolicy, snapshot: TemporalSnapshot) -> Result<Self, TemporalError> {
        let store = Self::new(policy);
        for (raw_path, history) in snapshot.paths {
            let path = Path::parse(&raw_path, &store.policy)?;
            let records = history
                .into_iter()
                .map(|r| ChangeRecord {
                    path: path.clone(),
                    content: Arc::from(r.content),
                    timestamp: r.timestamp,
                })
                .collect();
            store.entries.insert(path, RwLock::new(PathEntry { history: records }));
        }
        Ok(store)
    }
}

/// One change record's `(content, timestamp)` pair, serializable for
/// [`TemporalStore::snapshot`]/[`TemporalStore::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecordSnapshot {
    pub content: Vec<u8>,
    pub timestamp: i64,
}

/// The complete logical state of a [`TemporalStore`]: every path's history,
/// oldest change first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalSnapshot {
    pub paths: Vec<(String, Vec<ChangeRecordSnapshot>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TemporalStore {
        TemporalStore::new(PathPolicy::default())
    }

    #[test]
    fn s1_temporal_round_trip() {
        let s = store();
        s.put("src/a", b"one".to_vec()).unwrap();
        s.put("src/a", b"two".to_vec()).unwrap();
        s.put("src/a", b"three".to_vec()).unwrap();

        assert_eq!(&*s.get("src/a").unwrap(), b"three");

        let history = s.history("src/a", 10).unwrap();
        let contents: Vec<&[u8]> = history.iter().map(|r| &*r.content).collect();
        assert_eq!(contents, vec![b"three".as_slice(), b"two", b"one"]);
    }

    #[test]
    fn history_limit_caps_slice_length() {
        let s = store();
        for i in 0..5 {
            s.put("src/a", format!("v{i}").into_bytes()).unwrap();
        }
        assert_eq!(s.history("src/a", 2).unwrap().len(), 2);
        assert_eq!(s.history("src/a", 100).unwrap().len(), 5);
    }

    #[test]
    fn empty_content_round_trips() {
        let s = store();
        s.put("src/empty", Vec::new()).unwrap();
        assert_eq!(&*s.get("src/empty").unwrap(), b"");
    }

    #[test]
    fn s5_path_traversal_rejected_before_mutation() {
        let s = store();
        assert!(s.put("../../../etc/passwd", b"x".to_vec()).is_err());
        assert_eq!(s.path_count(), 0);
    }

    #[test]
    fn get_on_unknown_path_is_not_found() {
        let s = store();
        assert!(matches!(s.get("src/missing"), Err(TemporalError::NotFound(_))));
    }

    #[test]
    fn snapshot_then_restore_is_byte_identical() {
        let s = store();
        s.put("src/a", b"one".to_vec()).unwrap();
        s.put("src/a", b"two".to_vec()).unwrap();
        s.put("src/b", b"hello".to_vec()).unwrap();

        let snapshot = s.snapshot();
        let restored = TemporalStore::restore(PathPolicy::default(), snapshot).unwrap();

        assert_eq!(restored.get("src/a").unwrap(), s.get("src/a").unwrap());
        assert_eq!(restored.history("src/a", 10).unwrap().len(), s.history("src/a", 10).unwrap().len());
        assert_eq!(restored.get("src/b").unwrap(), s.get("src/b").unwrap());
        assert_eq!(restored.path_count(), s.path_count());
    }

    #[test]
    fn s6_concurrent_writes_linearize() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let s = StdArc::new(store());
        s.put("src/x", b"seed".to_vec()).unwrap();

        let writers: Vec<_> = (0..2)
            .map(|t| {
                let s = StdArc::clone(&s);
                thread::spawn(move || {
                    for i in 0..1000 {
                        s.put("src/x", format!("t{t}-{i}").into_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let len = s.history_len("src/x").unwrap();
        assert_eq!(len, 2001); // seed + 1000 + 1000

        let history = s.history("src/x", len).unwrap();
        let current = s.get("src/x").unwrap();
        assert_eq!(&*current, &*history[0].content);

        use std::collections::HashSet;
        let unique: HashSet<Vec<u8>> = history.iter().map(|r| r.content.to_vec()).collect();
        assert_eq!(unique.len(), 2001);
    }

    use proptest::prelude::*;

    proptest::proptest! {
        /// Property 1: for any sequence of writes to one path,
        /// `retrieve` returns the last write and `history` replays every
        /// write newest-first.
        #[test]
        fn history_order_matches_write_order(writes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..16), 1..50)) {
            let s = store();
            for w in &writes {
                s.put("src/prop", w.clone()).unwrap();
            }
            let expected_current = writes.last().unwrap().clone();
            prop_assert_eq!(&*s.get("src/prop").unwrap(), expected_current.as_slice());

            let history = s.history("src/prop", writes.len()).unwrap();
            let actual: Vec<Vec<u8>> = history.iter().map(|r| r.content.to_vec()).collect();
            let expected: Vec<Vec<u8>> = writes.iter().rev().cloned().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
