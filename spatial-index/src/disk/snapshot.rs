//! Independent full copies of a tree in the index file format.

use std::path::Path;

use log::info;

use super::format::{encode_page, encoded_page_len, FileHeader};
use super::storage::Storage;
use crate::constants::{DEFAULT_PAGE_SIZE, NODE_OVERHEAD_BYTES, POINT_ENTRY_BYTES};
use crate::errors::SpatialResult;
use crate::rtree::{Node, NodeId, NodeStore, RTree};

const PAGE_ALIGN: usize = 4096;

/// Writes header plus every live node of `tree` to a fresh file at `path`.
///
/// Node ids are kept, so the copy can be loaded as is. With `page_size` unset
/// the slot size is chosen to fit the largest node. The file is synced before
/// returning. The source tree is only read.
pub(crate) fn write_snapshot<S: NodeStore>(
    tree: &RTree<S>,
    path: &Path,
    page_size: Option<usize>,
) -> SpatialResult<()> {
    let meta = tree.meta();
    let live = live_nodes(tree)?;

    let page_size = match page_size {
        Some(size) => size,
        None => fitting_page_size(tree, meta.capacity, &live)?,
    };
    let node_count = if meta.root.is_some() {
        tree.store().node_count()
    } else {
        0
    };

    let storage = Storage::create(path, page_size)?;
    for &id in &live {
        let node = tree.store().read(id)?;
        storage.write_slot(id, &encode_page(&node, page_size)?)?;
    }
    storage.ensure_len(node_count)?;
    storage.write_header(&FileHeader::new(meta, node_count, page_size))?;
    storage.sync()?;

    info!(
        "Wrote snapshot of {} nodes to {}",
        live.len(),
        path.display()
    );
    Ok(())
}

/// Ids of every node reachable from the root.
fn live_nodes<S: NodeStore>(tree: &RTree<S>) -> SpatialResult<Vec<NodeId>> {
    let mut ids = Vec::new();
    let Some(root) = tree.meta().root else {
        return Ok(ids);
    };

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        ids.push(id);
        if let Node::Internal { children, .. } = &*tree.store().read(id)? {
            stack.extend(children.iter().map(|c| c.node_id));
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Smallest aligned slot size, at least the default, that fits every node.
fn fitting_page_size<S: NodeStore>(
    tree: &RTree<S>,
    capacity: usize,
    live: &[NodeId],
) -> SpatialResult<usize> {
    let mut needed = capacity * POINT_ENTRY_BYTES + NODE_OVERHEAD_BYTES;
    for &id in live {
        let node = tree.store().read(id)?;
        needed = needed.max(encoded_page_len(&node)?);
    }
    Ok(DEFAULT_PAGE_SIZE.max(needed.div_ceil(PAGE_ALIGN) * PAGE_ALIGN))
}
