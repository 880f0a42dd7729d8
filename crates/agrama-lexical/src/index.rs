use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::LexicalError;
use crate::tokenizer::tokenize;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    pub k: f64,
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone)]
struct Posting {
    path: Arc<str>,
    term_freq: u32,
}

#[derive(Default)]
struct Inner {
    postings: HashMap<String, Vec<Posting>>,
    /// Per-document term frequencies, kept so `remove` doesn't need to scan
    /// the whole inverted index.
    doc_terms: HashMap<Arc<str>, HashMap<String, u32>>,
    doc_len: HashMap<Arc<str>, u32>,
    total_len: u64,
}

impl Inner {
    fn avgdl(&self) -> f64 {
        if self.doc_len.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.doc_len.len() as f64
        }
    }

    fn doc_count(&self) -> usize {
        self.doc_len.len()
    }
}

/// Inverted postings plus per-path length, scored with a BM25-style
/// formula. Mutations are serialized behind a single
/// reader-writer lock; queries read a consistent snapshot because they
/// execute entirely under the read side of that lock, so a concurrent
/// `index`/`remove` cannot interleave mid-query.
pub struct LexicalIndex {
    inner: RwLock<Inner>,
    config: Bm25Config,
}

impl LexicalIndex {
    pub fn new(config: Bm25Config) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
        }
    }

    /// Indexes `text` under `path`, replacing any prior indexing of that
    /// path. Idempotent: `index(p, t); index(p, t)` and a single
    /// `index(p, t)` produce identical postings.
    pub fn index(&self, path: &str, text: &str) {
        let path: Arc<str> = Arc::from(path);
        let tokens = tokenize(text);
        let mut term_freq: HashMap<String, u32> = HashMap::new();
        for tok in &tokens {
            *term_freq.entry(tok.clone()).or_insert(0) += 1;
        }

        let mut inner = self.inner.write();
        remove_locked(&mut inner, &path);

        let doc_len = tokens.len() as u32;
        inner.total_len += doc_len as u64;
        inner.doc_len.insert(Arc::clone(&path), doc_len);

        for (term, count) in &term_freq {
            inner
                .postings
                .entry(term.clone())
                .or_default()
                .push(Posting {
                    path: Arc::clone(&path),
                    term_freq: *count,
                });
        }
        inner.doc_terms.insert(Arc::clone(&path), term_freq);
    }

    /// Removes a path from the index. Idempotent: removing a path that was
    /// never indexed (or already removed) is a no-op.
    pub fn remove(&self, path: &str) {
        let mut inner = self.inner.write();
        remove_locked(&mut inner, path);
    }

    /// Ranks indexed paths against a free-text query, highest score first.
    pub fn query(&self, text: &str, limit: usize) -> Result<Vec<(String, f64)>, LexicalError> {
        let terms = tokenize(text);
        if terms.is_empty() {
            return Err(LexicalError::EmptyQuery);
        }

        let inner = self.inner.read();
        let n = inner.doc_count() as f64;
        let avgdl = inner.avgdl();
        if n == 0.0 {
            return Ok(Vec::new());
        }

        let mut scores: HashMap<Arc<str>, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = inner.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5)).ln().max(0.0);
            if idf == 0.0 {
                continue;
            }
            for posting in postings {
                let doc_len = *inner.doc_len.get(&posting.path).unwrap_or(&0) as f64;
                let tf = posting.term_freq as f64;
                let denom = tf + self.config.k * (1.0 - self.config.b + self.config.b * doc_len / avgdl.max(1e-9));
                let score = idf * (tf * (self.config.k + 1.0)) / denom;
                *scores.entry(Arc::clone(&posting.path)).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(path, score)| (path.to_string(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub fn doc_count(&self) -> usize {
        self.inner.read().doc_count()
    }

    /// Captures every document's per-term counts directly, bypassing
    /// re-tokenization: BM25 scoring only ever depends on `term_freq` and
    /// `doc_len`, never on original text or token order, so the postings
    /// are fully reconstructible from `doc_terms` alone.
    pub fn snapshot(&self) -> LexicalSnapshot {
        let inner = self.inner.read();
        let documents = inner
            .doc_terms
            .iter()
            .map(|(path, terms)| DocumentSnapshot {
                path: path.to_string(),
                terms: terms.clone().into_iter().collect(),
            })
            .collect();
        LexicalSnapshot { documents }
    }

    /// Rebuilds an index from a prior `snapshot()` by replaying each
    /// document's term counts directly into the postings and length
    /// tables, without re-running the tokenizer.
    pub fn restore(config: Bm25Config, snapshot: LexicalSnapshot) -> Self {
        let index = Self::new(config);
        let mut inner = index.inner.write();
        for doc in snapshot.documents {
            let path: Arc<str> = Arc::from(doc.path.as_str());
            let term_freq: HashMap<String, u32> = doc.terms.into_iter().collect();
            let doc_len: u32 = term_freq.values().sum();
            inner.total_len += doc_len as u64;
            inner.doc_len.insert(Arc::clone(&path), doc_len);
            for (term, count) in &term_freq {
                inner
                    .postings
                    .entry(term.clone())
                    .or_default()
                    .push(Posting {
                        path: Arc::clone(&path),
                        term_freq: *count,
                    });
            }
            inner.doc_terms.insert(path, term_freq);
        }
        drop(inner);
        index
    }
}

/// One document's path and per-term counts, serializable for
/// [`LexicalIndex::snapshot`]/[`LexicalIndex::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub path: String,
    pub terms: Vec<(String, u32)>,
}

/// The complete logical state of a [`LexicalIndex`]: every document's term
/// counts, from which postings and averages are rebuilt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexicalSnapshot {
    pub documents: Vec<DocumentSnapshot>,
}

fn remove_locked(inner: &mut Inner, path: &str) {
    let Some(terms) = inner.doc_terms.remove(path) else {
        return;
    };
    if let Some(len) = inner.doc_len.remove(path) {
        inner.total_len = inner.total_len.saturating_sub(len as u64);
    }
    for term in terms.keys() {
        if let Some(list) = inner.postings.get_mut(term) {
            list.retain(|p| &*p.path != path);
            if list.is_empty() {
                inner.postings.remove(term);
            }
        }
    }
}
