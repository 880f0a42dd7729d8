//! End-to-end scenarios, driven entirely through `Core`'s public primitive
//! API rather than any single backend's internals. Whole-system tests live
//! at the crate boundary, one level up from the per-backend unit tests
//! each crate keeps inline.

use agrama_engine::{
    CancelToken, Config, Core, Identity, LinkParams, SearchMode, SearchParams, StoreParams,
};

fn identity() -> Identity {
    Identity::agent("scenario-agent")
}

fn core_with_dim(dim: usize) -> Core {
    Core::new(Config { embedding_dim: dim, ..Config::default() }).unwrap()
}

/// S1: a sequence of stores to one path is fully recoverable via
/// `retrieve` (current content) and `history` (newest first).
#[test]
fn s1_temporal_round_trip() {
    let core = core_with_dim(64);
    for content in ["one", "two", "three"] {
        core.store(
            &identity(),
            StoreParams { path: "src/doc".into(), content: content.as_bytes().to_vec(), ..Default::default() },
            &CancelToken::new(),
        )
        .unwrap();
    }

    let outcome = core
        .retrieve(&identity(), agrama_engine::RetrieveParams { path: "src/doc".into(), history_limit: Some(10), include_neighbors: false })
        .unwrap();
    assert_eq!(outcome.content, b"three");
    let contents: Vec<Vec<u8>> = outcome.history.iter().map(|h| h.content.clone()).collect();
    assert_eq!(contents, vec![b"three".to_vec(), b"two".to_vec(), b"one".to_vec()]);
}

/// S2: semantic search over two well-separated clusters returns only the
/// matching cluster's members for a query at its center.
#[test]
fn s2_semantic_recall_on_two_clusters() {
    let core = core_with_dim(64);
    let mut rng_state: u64 = 7;
    let mut next = || {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f32 / u32::MAX as f32) - 0.5
    };

    for i in 0..40 {
        let v: Vec<f32> = (0..64).map(|_| 0.0 + next() * 0.5).collect();
        core.store(
            &identity(),
            StoreParams { path: format!("src/cluster-a-{i}"), content: b"a".to_vec(), embedding: Some(v), ..Default::default() },
            &CancelToken::new(),
        )
        .unwrap();
    }
    for i in 0..40 {
        let v: Vec<f32> = (0..64).map(|_| 50.0 + next() * 0.5).collect();
        core.store(
            &identity(),
            StoreParams { path: format!("src/cluster-b-{i}"), content: b"b".to_vec(), embedding: Some(v), ..Default::default() },
            &CancelToken::new(),
        )
        .unwrap();
    }

    let outcome = core
        .search(
            &identity(),
            SearchParams { mode: Some(SearchMode::Semantic), vector: Some(vec![0.0; 64]), limit: 10, ..Default::default() },
        )
        .unwrap();
    assert!(outcome.results.iter().all(|(path, _)| path.contains("cluster-a")));
}

/// S3: graph-mode search returns paths within the requested bound, sorted
/// nearest-first, matching the frontier-reduction traversal contract.
#[test]
fn s3_bounded_graph_traversal() {
    let core = core_with_dim(64);
    for path in ["src/a", "src/b", "src/c"] {
        core.store(&identity(), StoreParams { path: path.into(), content: b"x".to_vec(), ..Default::default() }, &CancelToken::new()).unwrap();
    }
    core.link(&identity(), LinkParams { from: "src/a".into(), to: "src/b".into(), kind: "references".into(), weight: Some(1.0), attrs: None }).unwrap();
    core.link(&identity(), LinkParams { from: "src/b".into(), to: "src/c".into(), kind: "references".into(), weight: Some(1.0), attrs: None }).unwrap();

    let outcome = core
        .search(
            &identity(),
            SearchParams { mode: Some(SearchMode::Graph), seeds: vec!["src/a".into()], graph_bound: Some(5.0), limit: 10, ..Default::default() },
        )
        .unwrap();
    let paths: Vec<&str> = outcome.results.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["src/a", "src/b", "src/c"]);
}

/// S4: hybrid search blends lexical, semantic, and graph evidence so a
/// path strong on all three axes outranks one strong on none.
#[test]
fn s4_hybrid_fusion_ordering() {
    fn embedding(lead: [f32; 4]) -> Vec<f32> {
        let mut v = lead.to_vec();
        v.resize(64, 0.0);
        v
    }

    let core = core_with_dim(64);
    core.store(
        &identity(),
        StoreParams {
            path: "src/auth-middleware".into(),
            content: b"x".to_vec(),
            tokens: Some("authentication middleware handles login tokens".into()),
            embedding: Some(embedding([1.0, 1.0, 0.0, 0.0])),
            ..Default::default()
        },
        &CancelToken::new(),
    )
    .unwrap();
    core.store(
        &identity(),
        StoreParams {
            path: "src/unrelated".into(),
            content: b"x".to_vec(),
            tokens: Some("a small string formatting helper".into()),
            embedding: Some(embedding([-1.0, -1.0, 0.0, 0.0])),
            ..Default::default()
        },
        &CancelToken::new(),
    )
    .unwrap();

    let outcome = core
        .search(
            &identity(),
            SearchParams {
                mode: Some(SearchMode::Hybrid),
                text: Some("authentication middleware".into()),
                vector: Some(embedding([1.0, 1.0, 0.0, 0.0])),
                limit: 5,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(outcome.results[0].0, "src/auth-middleware");
}

/// S5: a path-traversal attempt is rejected before any state is mutated.
#[test]
fn s5_path_traversal_rejected_before_mutation() {
    let core = core_with_dim(64);
    let err = core
        .store(&identity(), StoreParams { path: "../../../etc/passwd".into(), content: b"x".to_vec(), ..Default::default() }, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, agrama_engine::EngineError::InvalidPath(_)));
    assert!(core
        .retrieve(&identity(), agrama_engine::RetrieveParams { path: "../../../etc/passwd".into(), history_limit: Some(1), include_neighbors: false })
        .is_err());
}

/// S6: concurrent writers to the same path linearize into one
/// non-decreasing, complete history rather than losing writes.
#[test]
fn s6_concurrent_writes_linearize() {
    use std::sync::Arc;
    use std::thread;

    let core = Arc::new(core_with_dim(64));
    core.store(&identity(), StoreParams { path: "src/shared".into(), content: b"seed".to_vec(), ..Default::default() }, &CancelToken::new()).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                for i in 0..200 {
                    core.store(
                        &identity(),
                        StoreParams { path: "src/shared".into(), content: format!("t{t}-{i}").into_bytes(), ..Default::default() },
                        &CancelToken::new(),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let outcome = core
        .retrieve(&identity(), agrama_engine::RetrieveParams { path: "src/shared".into(), history_limit: Some(10_000), include_neighbors: false })
        .unwrap();
    assert_eq!(outcome.history.len(), 1 + 4 * 200);

    use std::collections::HashSet;
    let unique: HashSet<Vec<u8>> = outcome.history.iter().map(|h| h.content.clone()).collect();
    assert_eq!(unique.len(), outcome.history.len());
}
