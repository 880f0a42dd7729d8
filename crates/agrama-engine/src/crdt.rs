use std::collections::HashMap;
use std::sync::Arc;

/// A globally unique element identity: a per-participant Lamport clock plus
/// the participant's identity string. Ordering compares the clock first,
/// then falls back to the participant string as a fixed tie-break, so two
/// replicas merge operations into the same total order regardless of the
/// order they observed them in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemId {
    pub clock: u64,
    pub participant: Arc<str>,
}

#[derive(Debug, Clone)]
struct Element {
    origin: Option<ElemId>,
    value: char,
    tombstone: bool,
}

/// A replicated growable array over Unicode scalar values: per-path
/// collaborative content merge that stays order-independent of observation
/// order. Scope is deliberately narrow — only the content whose caller
/// opts in via `store`'s CRDT flag goes through this path; everything else
/// keeps the temporal store's plain last-writer-wins append semantics.
pub struct Rga {
    participant: Arc<str>,
    clock: u64,
    elements: HashMap<ElemId, Element>,
}

impl Rga {
    pub fn new(participant: impl Into<Arc<str>>) -> Self {
        Self {
            participant: participant.into(),
            clock: 0,
            elements: HashMap::new(),
        }
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    fn tick(&mut self) -> ElemId {
        self.clock += 1;
        ElemId {
            clock: self.clock,
            participant: Arc::clone(&self.participant),
        }
    }

    /// Inserts `value` immediately after `after` (`None` = new head),
    /// tagged with this replica's next Lamport clock, and returns the new
    /// element's id so a caller can insert after it in turn or delete it
    /// later.
    pub fn insert(&mut self, after: Option<ElemId>, value: char) -> ElemId {
        let id = self.tick();
        self.elements.insert(
            id.clone(),
            Element {
                origin: after,
                value,
                tombstone: false,
            },
        );
        id
    }

    /// Marks `id` as deleted. A tombstone, never a true removal — the
    /// merge rule needs every participant to agree an element once existed
    /// even after it's gone from the visible text.
    pub fn delete(&mut self, id: &ElemId) {
        if let Some(el) = self.elements.get_mut(id) {
            el.tombstone = true;
        }
    }

    /// Merges `other`'s full element set into `self`: every element and
    /// tombstone `other` knows about becomes known to `self`, and `self`'s
    /// Lamport clock advances past the highest clock seen so new local
    /// inserts still get fresh ids. Merging is commutative and idempotent:
    /// calling it twice, or merging `a` into `b` then `b` into `a`, yields
    /// the same visible text on both sides.
    pub fn merge(&mut self, other: &Rga) {
        for (id, el) in &other.elements {
            match self.elements.get_mut(id) {
                Some(existing) => existing.tombstone = existing.tombstone || el.tombstone,
                None => {
                    self.elements.insert(id.clone(), el.clone());
                }
            }
            if id.clock > self.clock {
                self.clock = id.clock;
            }
        }
    }

    /// Materializes the current visible text by reconstructing the total
    /// order from the `(id, origin)` structure alone — this is why the
    /// result is independent of insertion or merge order: the order is a
    /// pure function of the element set, not of how that set was built up.
    pub fn text(&self) -> String {
        self.order()
            .into_iter()
            .filter_map(|id| self.elements.get(&id))
            .filter(|el| !el.tombstone)
            .map(|el| el.value)
            .collect()
    }

    /// Ids of every currently-visible (non-tombstoned) element, in text
    /// order. Used by callers building a higher-level "replace the whole
    /// document" edit on top of this primitive insert/delete pair.
    pub fn visible_ids(&self) -> Vec<ElemId> {
        self.order()
            .into_iter()
            .filter(|id| !self.elements[id].tombstone)
            .collect()
    }

    /// The id of the last visible element, or `None` if the document is
    /// empty — the natural anchor for appending more text.
    pub fn last_visible_id(&self) -> Option<ElemId> {
        self.visible_ids().into_iter().last()
    }

    fn order(&self) -> Vec<ElemId> {
        let mut children: HashMap<Option<ElemId>, Vec<ElemId>> = HashMap::new();
        for id in self.elements.keys() {
            children
                .entry(self.elements[id].origin.clone())
                .or_default()
                .push(id.clone());
        }
        for siblings in children.values_mut() {
            // Descending by id: higher clock (tie-broken by participant)
            // sorts first among concurrent siblings anchored at the same
            // origin — an arbitrary but fixed rule, applied identically by
            // every replica since it depends only on the ids themselves.
            siblings.sort_by(|a, b| b.cmp(a));
        }

        // Pre-order DFS from the virtual root (`None`): visit a node, then
        // immediately its children's subtrees, matching RGA's "insert
        // right after origin" semantics.
        fn visit(
            id: &ElemId,
            children: &HashMap<Option<ElemId>, Vec<ElemId>>,
            result: &mut Vec<ElemId>,
        ) {
            result.push(id.clone());
            if let Some(kids) = children.get(&Some(id.clone())) {
                for kid in kids {
                    visit(kid, children, result);
                }
            }
        }

        let mut result = Vec::with_capacity(self.elements.len());
        if let Some(roots) = children.get(&None) {
            for id in roots {
                visit(id, &children, &mut result);
            }
        }
        result
    }
}

/// Owns one CRDT document per opted-in path, plus one local replica per
/// `(path, participant)` pair. A `store` call with the CRDT flag set
/// lands here instead of going straight through the
/// temporal store's last-writer-wins append.
///
/// A `store` whose new content extends the participant's last known text
/// is applied as a tail-append of the new characters; anything else is
/// applied as "delete everything currently visible, then insert the new
/// text", so even a full rewrite still merges character-by-character
/// rather than discarding concurrent edits outright.
pub struct CrdtStore {
    replicas: parking_lot::RwLock<HashMap<(String, String), Rga>>,
    canonical: parking_lot::RwLock<HashMap<String, Rga>>,
}

impl Default for CrdtStore {
    fn default() -> Self {
        Self {
            replicas: parking_lot::RwLock::new(HashMap::new()),
            canonical: parking_lot::RwLock::new(HashMap::new()),
        }
    }
}

impl CrdtStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `new_text` as `participant`'s edit of `path` and returns the
    /// resulting merged visible text for the path.
    pub fn apply_edit(&self, path: &str, participant: &str, new_text: &str) -> String {
        let key = (path.to_string(), participant.to_string());
        let mut replica = self
            .replicas
            .write()
            .remove(&key)
            .unwrap_or_else(|| Rga::new(participant.to_string()));

        if let Some(doc) = self.canonical.read().get(path) {
            replica.merge(doc);
        }

        let current = replica.text();
        if new_text != current {
            if let Some(suffix) = new_text.strip_prefix(current.as_str()) {
                let mut after = replica.last_visible_id();
                for ch in suffix.chars() {
                    after = Some(replica.insert(after, ch));
                }
            } else {
                for id in replica.visible_ids() {
                    replica.delete(&id);
                }
                let mut after = None;
                for ch in new_text.chars() {
                    after = Some(replica.insert(after, ch));
                }
            }
        }

        let mut canonical = self.canonical.write();
        let doc = canonical
            .entry(path.to_string())
            .or_insert_with(|| Rga::new("canonical"));
        doc.merge(&replica);
        let merged_text = doc.text();

        self.replicas.write().insert(key, replica);
        merged_text
    }

    pub fn current_text(&self, path: &str) -> Option<String> {
        self.canonical.read().get(path).map(Rga::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_replica_round_trips() {
        let mut rga = Rga::new("alice");
        let a = rga.insert(None, 'a');
        let b = rga.insert(Some(a), 'b');
        rga.insert(Some(b), 'c');
        assert_eq!(rga.text(), "abc");
    }

    #[test]
    fn delete_removes_from_visible_text_but_not_structure() {
        let mut rga = Rga::new("alice");
        let a = rga.insert(None, 'a');
        let b = rga.insert(Some(a), 'b');
        rga.insert(Some(b), 'c');
        rga.delete(&b);
        assert_eq!(rga.text(), "ac");
    }

    #[test]
    fn merge_is_order_independent() {
        // Shared prefix "a", then alice appends 'b' and bob concurrently
        // appends 'c', both anchored after the shared 'a'.
        let mut seed = Rga::new("seed");
        let a = seed.insert(None, 'a');

        let mut alice = Rga::new("alice");
        alice.merge(&seed);
        alice.insert(Some(a.clone()), 'b');

        let mut bob = Rga::new("bob");
        bob.merge(&seed);
        bob.insert(Some(a.clone()), 'c');

        // Replica 1: alice-then-bob.
        let mut replica1 = Rga::new("replica1");
        replica1.merge(&alice);
        replica1.merge(&bob);

        // Replica 2: bob-then-alice (reversed observation order).
        let mut replica2 = Rga::new("replica2");
        replica2.merge(&bob);
        replica2.merge(&alice);

        assert_eq!(replica1.text(), replica2.text());
        assert_eq!(replica1.text().len(), 3);
        assert!(replica1.text().starts_with('a'));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut alice = Rga::new("alice");
        alice.insert(None, 'x');

        let mut replica = Rga::new("replica");
        replica.merge(&alice);
        let once = replica.text();
        replica.merge(&alice);
        let twice = replica.text();
        assert_eq!(once, twice);
    }

    #[test]
    fn concurrent_delete_and_merge_converges() {
        let mut seed = Rga::new("seed");
        let a = seed.insert(None, 'a');
        let b = seed.insert(Some(a), 'b');

        let mut alice = Rga::new("alice");
        alice.merge(&seed);
        alice.delete(&b);

        let mut bob = Rga::new("bob");
        bob.merge(&seed);
        bob.insert(Some(b), 'x');

        let mut merged_ab = Rga::new("merged1");
        merged_ab.merge(&alice);
        merged_ab.merge(&bob);

        let mut merged_ba = Rga::new("merged2");
        merged_ba.merge(&bob);
        merged_ba.merge(&alice);

        assert_eq!(merged_ab.text(), merged_ba.text());
        assert_eq!(merged_ab.text(), "ax");
    }
}
