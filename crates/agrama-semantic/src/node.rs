use std::sync::Arc;

use parking_lot::RwLock;

/// Stable integer handle into the index's node arena. Never reused:
/// deletion is not offered by the core, so a handle
/// identifies a node for the index's whole lifetime.
pub type NodeHandle = u32;

/// One node's immutable payload plus its per-level neighbor lists.
///
/// The embedding and path are set once at insertion and never mutated
/// afterward, so readers can clone the node's `Arc` and release the arena
/// lock immediately; only `neighbors[level]` changes after insertion, and
/// each level has its own lock so unrelated levels (and unrelated nodes)
/// never contend.
pub struct NodeData {
    pub path: Arc<str>,
    pub vector: Vec<f32>,
    pub top_level: usize,
    neighbors: Vec<RwLock<Vec<NodeHandle>>>,
}

impl NodeData {
    pub fn new(path: Arc<str>, vector: Vec<f32>, top_level: usize) -> Self {
        let neighbors = (0..=top_level).map(|_| RwLock::new(Vec::new())).collect();
        Self {
            path,
            vector,
            top_level,
            neighbors,
        }
    }

    pub fn neighbors_at(&self, level: usize) -> Vec<NodeHandle> {
        self.neighbors
            .get(level)
            .map(|lock| lock.read().clone())
            .unwrap_or_default()
    }

    pub fn set_neighbors_at(&self, level: usize, handles: Vec<NodeHandle>) {
        if let Some(lock) = self.neighbors.get(level) {
            *lock.write() = handles;
        }
    }

    pub fn add_neighbor_at(&self, level: usize, handle: NodeHandle) {
        if let Some(lock) = self.neighbors.get(level) {
            let mut guard = lock.write();
            if !guard.contains(&handle) {
                guard.push(handle);
            }
        }
    }
}

/// Arena-backed node table: a growable vector of `Arc<NodeData>` addressed
/// by stable integer handle. The neighbor graph is cyclic, so nodes are
/// owned by one arena and referenced by handle rather than by raw pointer
/// or reference-counted cross-links.
#[derive(Default)]
pub struct NodeArena {
    nodes: RwLock<Vec<Arc<NodeData>>>,
}

impl NodeArena {
    pub fn push(&self, node: NodeData) -> NodeHandle {
        let mut nodes = self.nodes.write();
        let handle = nodes.len() as NodeHandle;
        nodes.push(Arc::new(node));
        handle
    }

    pub fn get(&self, handle: NodeHandle) -> Arc<NodeData> {
        Arc::clone(&self.nodes.read()[handle as usize])
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
