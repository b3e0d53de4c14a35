//! LRU cache for R-Tree nodes.
//!
//! The cache never loads anything by itself: nodes enter it when they are
//! first read from disk or written by the tree. Its size bound is enforced by
//! the owner, which must write a dirty victim back before dropping it.

use std::sync::Arc;

use lru::LruCache;

use crate::rtree::{Node, NodeId};

/// A cached node with its dirty flag
#[derive(Debug, Clone)]
pub(crate) struct CachedNode {
    pub node: Arc<Node>,
    pub dirty: bool,
}

/// LRU cache for R-Tree nodes
pub(crate) struct NodeCache {
    nodes: LruCache<NodeId, CachedNode>,
    capacity: usize,
}

impl NodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    /// Returns a cached node and marks it most recently used.
    pub fn get(&mut self, id: NodeId) -> Option<Arc<Node>> {
        self.nodes.get(&id).map(|cached| Arc::clone(&cached.node))
    }

    /// Inserts or replaces a node. A replaced dirty node stays dirty.
    pub fn insert(&mut self, id: NodeId, node: Arc<Node>, dirty: bool) {
        let was_dirty = self.nodes.peek(&id).is_some_and(|c| c.dirty);
        self.nodes.put(
            id,
            CachedNode {
                node,
                dirty: dirty || was_dirty,
            },
        );
    }

    /// The least recently used node, without removing it.
    pub fn peek_lru(&self) -> Option<(NodeId, CachedNode)> {
        self.nodes.peek_lru().map(|(id, cached)| (*id, cached.clone()))
    }

    pub fn pop_lru(&mut self) -> Option<(NodeId, CachedNode)> {
        self.nodes.pop_lru()
    }

    pub fn over_capacity(&self) -> bool {
        self.nodes.len() > self.capacity
    }

    /// Dirty nodes ordered by id, so flushing writes the file front to back.
    pub fn dirty_nodes(&self) -> Vec<(NodeId, Arc<Node>)> {
        let mut dirty: Vec<(NodeId, Arc<Node>)> = self
            .nodes
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, cached)| (*id, Arc::clone(&cached.node)))
            .collect();
        dirty.sort_unstable_by_key(|(id, _)| *id);
        dirty
    }

    pub fn dirty_count(&self) -> usize {
        self.nodes.iter().filter(|(_, cached)| cached.dirty).count()
    }

    /// Mark a node as clean
    pub fn mark_clean(&mut self, id: NodeId) {
        if let Some(cached) = self.nodes.peek_mut(&id) {
            cached.dirty = false;
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Arc<Node> {
        Arc::new(Node::empty_leaf())
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = NodeCache::new(10);
        cache.insert(1, node(), false);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(1).is_some());
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_lru_order() {
        let mut cache = NodeCache::new(3);
        cache.insert(1, node(), false);
        cache.insert(2, node(), false);
        cache.insert(3, node(), false);
        assert!(!cache.over_capacity());

        // Access node 1 to make it most recent
        let _ = cache.get(1);
        cache.insert(4, node(), false);
        assert!(cache.over_capacity());

        assert_eq!(cache.peek_lru().map(|(id, _)| id), Some(2));
        assert_eq!(cache.pop_lru().map(|(id, _)| id), Some(2));
        assert!(!cache.over_capacity());
        assert!([1, 3, 4].iter().all(|&id| cache.get(id).is_some()));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut cache = NodeCache::new(10);
        cache.insert(3, node(), true);
        cache.insert(2, node(), false);
        cache.insert(1, node(), true);

        let ids: Vec<NodeId> = cache.dirty_nodes().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 3]);

        cache.mark_clean(3);
        assert_eq!(cache.dirty_count(), 1);
    }

    #[test]
    fn test_clean_reinsert_keeps_dirty_flag() {
        let mut cache = NodeCache::new(10);
        cache.insert(1, node(), true);
        cache.insert(1, node(), false);
        assert_eq!(cache.dirty_count(), 1);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = NodeCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.set_capacity(5);
        assert_eq!(cache.capacity(), 5);
    }
}
