//! Node storage behind the R-Tree algorithms.
//!
//! The tree addresses its nodes by [`NodeId`] only, so the same insert, split
//! and search code runs over a plain in-memory map or over a paged file with a
//! node cache.

use std::collections::HashMap;
use std::sync::Arc;

use super::node::{Node, NodeId};
use crate::errors::{SpatialError, SpatialResult};

/// Where R-Tree nodes live.
pub trait NodeStore {
    /// Returns the node with the given id.
    fn read(&self, id: NodeId) -> SpatialResult<Arc<Node>>;

    /// Replaces the node with the given id.
    fn write(&mut self, id: NodeId, node: Node) -> SpatialResult<()>;

    /// Reserves a fresh node id.
    fn allocate(&mut self) -> NodeId;

    /// Number of ids handed out so far.
    fn node_count(&self) -> u64;
}

/// Keeps every node in a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: HashMap<NodeId, Arc<Node>>,
    next_id: NodeId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
        }
    }
}

impl NodeStore for MemoryStore {
    fn read(&self, id: NodeId) -> SpatialResult<Arc<Node>> {
        self.nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| SpatialError::corrupt(format!("node {} does not exist", id)))
    }

    fn write(&mut self, id: NodeId, node: Node) -> SpatialResult<()> {
        self.nodes.insert(id, Arc::new(node));
        Ok(())
    }

    fn allocate(&mut self) -> NodeId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    fn node_count(&self) -> u64 {
        self.next_id.saturating_sub(1)
    }
}
