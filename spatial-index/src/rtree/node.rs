//! R-Tree node types.

use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::geometry::Geometry;

/// Stable identifier of a node. Ids start at 1.
pub type NodeId = u64;

/// An entry in a leaf node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub bbox: BoundingBox,
    pub geometry: Geometry,
}

impl LeafEntry {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            bbox: geometry.bounding_box(),
            geometry,
        }
    }
}

/// A child reference in an internal node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    pub bbox: BoundingBox,
    pub node_id: NodeId,
}

/// Node types in the R-Tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Leaf node containing actual entries
    Leaf { entries: Vec<LeafEntry> },
    /// Internal node containing child references
    Internal {
        children: Vec<ChildRef>,
        level: u32, // Height from leaf level (leaves are 0)
    },
}

impl Node {
    pub fn empty_leaf() -> Self {
        Node::Leaf {
            entries: Vec::new(),
        }
    }

    /// Tight union of the boxes held by this node.
    pub fn compute_bbox(&self) -> BoundingBox {
        match self {
            Node::Leaf { entries } => entries
                .iter()
                .fold(BoundingBox::empty(), |acc, e| acc.union(&e.bbox)),
            Node::Internal { children, .. } => children
                .iter()
                .fold(BoundingBox::empty(), |acc, c| acc.union(&c.bbox)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Leaves are level 0.
    pub fn level(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { level, .. } => *level,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Internal { children, .. } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
