//! [`NodeStore`] over a paged file with an LRU node cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{trace, warn};
use parking_lot::Mutex;

use super::cache::NodeCache;
use super::storage::Storage;
use crate::errors::SpatialResult;
use crate::rtree::{Node, NodeId, NodeStore};
use crate::stats::CacheStats;

#[derive(Debug, Default)]
struct IoCounters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

/// Nodes live in their file slots; recently used ones are kept in memory.
///
/// Writes only touch the cache and mark the node dirty. A dirty node reaches
/// the file when it is evicted or when [`PagedStore::flush_nodes`] runs.
pub(crate) struct PagedStore {
    storage: Storage,
    cache: Mutex<NodeCache>,
    next_id: NodeId,
    counters: IoCounters,
}

impl PagedStore {
    pub fn new(storage: Storage, cache_nodes: usize, node_count: u64) -> Self {
        Self {
            storage,
            cache: Mutex::new(NodeCache::new(cache_nodes)),
            next_id: node_count + 1,
            counters: IoCounters::default(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Writes every dirty node to its slot, in id order.
    ///
    /// Nodes written before a failure are marked clean; the rest stay dirty so
    /// a later flush can retry them.
    pub fn flush_nodes(&self) -> SpatialResult<usize> {
        let mut cache = self.cache.lock();
        let dirty = cache.dirty_nodes();
        for (id, node) in &dirty {
            self.storage.write_node(*id, node)?;
            self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
            cache.mark_clean(*id);
        }
        Ok(dirty.len())
    }

    pub fn has_dirty_nodes(&self) -> bool {
        self.cache.lock().dirty_count() > 0
    }

    pub fn set_cache_size(&self, cache_nodes: usize) {
        let mut cache = self.cache.lock();
        cache.set_capacity(cache_nodes);
        self.evict_excess(&mut cache);
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            cached_nodes: cache.len() as u64,
            cache_capacity: cache.capacity() as u64,
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.counters.disk_writes.load(Ordering::Relaxed),
        }
    }

    /// Shrinks the cache back to its bound, writing dirty victims first.
    ///
    /// A victim whose write fails stays cached and dirty, leaving the cache
    /// over its bound until a later eviction or flush succeeds.
    fn evict_excess(&self, cache: &mut NodeCache) {
        while cache.over_capacity() {
            let Some((id, victim)) = cache.peek_lru() else {
                break;
            };

            if victim.dirty {
                if let Err(e) = self.storage.write_node(id, &victim.node) {
                    warn!(
                        "Failed to write back evicted node {} of {}: {}",
                        id,
                        self.storage.path().display(),
                        e
                    );
                    break;
                }
                self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
                trace!("Wrote back evicted node {}", id);
            }
            cache.pop_lru();
        }
    }
}

impl NodeStore for PagedStore {
    fn read(&self, id: NodeId) -> SpatialResult<Arc<Node>> {
        let mut cache = self.cache.lock();
        if let Some(node) = cache.get(id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(node);
        }

        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        let node = Arc::new(self.storage.read_node(id)?);
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);

        cache.insert(id, Arc::clone(&node), false);
        self.evict_excess(&mut cache);
        Ok(node)
    }

    fn write(&mut self, id: NodeId, node: Node) -> SpatialResult<()> {
        let mut cache = self.cache.lock();
        cache.insert(id, Arc::new(node), true);
        self.evict_excess(&mut cache);
        Ok(())
    }

    fn allocate(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node_count(&self) -> u64 {
        self.next_id - 1
    }
}
