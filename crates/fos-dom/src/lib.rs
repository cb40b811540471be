//! fOS DOM - Document Object Model
//!
//! Memory-efficient DOM tree implementation.
//!
//! This is the *native* tree: one flat ordered child list per node and a
//! single parent link. Shadow-aware views are layered on top by `fos-shadow`.

mod node;
mod tree;
mod document;
mod interner;

use std::fmt;

pub use node::{Node, NodeData, NodeKind, ElementData, TextData, Attribute};
pub use tree::{DomTree, Children};
pub use document::Document;
pub use interner::{StringInterner, InternedString};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node" in link fields
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this ID refers to a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Convert a link field into an `Option`
    #[inline]
    pub fn to_option(self) -> Option<NodeId> {
        if self.is_valid() { Some(self) } else { None }
    }

    /// Raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#none")
        }
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node (or reference child) not found where expected
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    /// Hierarchy error (e.g., inserting ancestor)
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    /// Operation not valid for this node type
    #[error("Invalid node type for {0}")]
    InvalidNodeType(NodeId),
}
