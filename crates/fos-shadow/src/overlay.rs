//! Tree Overlay
//!
//! Explicit ordered child lists ("virtual children") for virtualized nodes,
//! overriding the native child list. Shadow hosts are virtualized when a
//! shadow is attached; slots when they are first recognized.
//!
//! Ownership is recorded in both directions: `virtual_children` per parent
//! and `virtual_parent` per child, so navigation never has to infer the
//! logical owner by inspecting native structure.
//!
//! Membership tests are linear in the child count.

use std::collections::HashMap;

use fos_dom::{DomTree, NodeId, NodeKind};

use crate::{ShadowError, ShadowResult};

/// Per-node virtual child lists and back references
#[derive(Debug, Default)]
pub struct TreeOverlay {
    virtual_children: HashMap<NodeId, Vec<NodeId>>,
    virtual_parent: HashMap<NodeId, NodeId>,
}

impl TreeOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_virtualized(&self, node: NodeId) -> bool {
        self.virtual_children.contains_key(&node)
    }

    /// Logical children of a virtualized node
    pub fn virtual_children(&self, node: NodeId) -> Option<&[NodeId]> {
        self.virtual_children.get(&node).map(Vec::as_slice)
    }

    pub fn virtual_parent(&self, node: NodeId) -> Option<NodeId> {
        self.virtual_parent.get(&node).copied()
    }

    /// Index of `child` in `parent`'s virtual children
    pub fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.virtual_children.get(&parent)?.iter().position(|&c| c == child)
    }

    /// Capture the current native children as the virtual child list.
    ///
    /// Native structure is left untouched. A node is virtualized at most once.
    pub fn virtualize(&mut self, tree: &DomTree, node: NodeId) -> ShadowResult<()> {
        if self.is_virtualized(node) {
            return Err(ShadowError::Hierarchy(format!("node {} is already virtual", node)));
        }
        let children = tree.child_ids(node);
        for &child in &children {
            self.virtual_parent.insert(child, node);
        }
        tracing::trace!("virtualized {} with {} children", node, children.len());
        self.virtual_children.insert(node, children);
        Ok(())
    }

    /// Splice `child` into `parent`'s virtual children before `reference`
    /// (at the end for `None`). A fragment contributes its native children
    /// instead of itself. Inserted nodes are detached natively, leaving
    /// their placement to projection.
    ///
    /// Returns the nodes that were inserted.
    pub fn insert(
        &mut self,
        tree: &mut DomTree,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> ShadowResult<Vec<NodeId>> {
        if !self.is_virtualized(parent) {
            return Err(ShadowError::Hierarchy(format!("node {} has no overlay entry", parent)));
        }
        if let Some(r) = reference {
            if self.position(parent, r).is_none() {
                return Err(ShadowError::NotFound(format!("reference {} is not a child of {}", r, parent)));
            }
        }

        let inserted = if tree.kind(child) == Some(NodeKind::DocumentFragment) {
            tree.remove_all_children(child)
        } else {
            vec![child]
        };
        if let Some(r) = reference {
            if inserted.contains(&r) {
                return Err(ShadowError::Hierarchy(format!("reference {} is being inserted", r)));
            }
        }

        // Keep membership unique: leave any previous virtual parent first
        for &node in &inserted {
            self.unlink(node);
            tree.detach(node);
        }

        let list = self.virtual_children.entry(parent).or_default();
        let idx = match reference {
            Some(r) => list.iter().position(|&c| c == r).unwrap_or(list.len()),
            None => list.len(),
        };
        list.splice(idx..idx, inserted.iter().copied());
        for &node in &inserted {
            self.virtual_parent.insert(node, parent);
        }
        Ok(inserted)
    }

    /// Splice `child` out of `parent`'s virtual children and detach it natively
    pub fn remove(&mut self, tree: &mut DomTree, parent: NodeId, child: NodeId) -> ShadowResult<()> {
        let list = self
            .virtual_children
            .get_mut(&parent)
            .ok_or_else(|| ShadowError::Hierarchy(format!("node {} has no overlay entry", parent)))?;
        let idx = list
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| ShadowError::NotFound(format!("{} is not a child of {}", child, parent)))?;
        list.remove(idx);
        self.virtual_parent.remove(&child);
        tree.detach(child);
        Ok(())
    }

    /// Remove and detach all virtual children, returning them in order
    pub fn clear(&mut self, tree: &mut DomTree, parent: NodeId) -> Vec<NodeId> {
        let Some(list) = self.virtual_children.get_mut(&parent) else {
            return Vec::new();
        };
        let removed = std::mem::take(list);
        for &child in &removed {
            self.virtual_parent.remove(&child);
            tree.detach(child);
        }
        removed
    }

    /// Break the list/back-reference pairing for consistency tests
    #[cfg(test)]
    pub(crate) fn forget_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(list) = self.virtual_children.get_mut(&parent) {
            list.retain(|&c| c != child);
        }
    }

    /// Drop `node` from its current virtual parent's list, if any
    fn unlink(&mut self, node: NodeId) {
        if let Some(old) = self.virtual_parent.remove(&node) {
            if let Some(list) = self.virtual_children.get_mut(&old) {
                list.retain(|&c| c != node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with_children(tree: &mut DomTree, n: usize) -> (NodeId, Vec<NodeId>) {
        let host = tree.create_element("div");
        let kids: Vec<_> = (0..n).map(|i| tree.create_text(&i.to_string())).collect();
        for &k in &kids {
            tree.append_child(host, k).unwrap();
        }
        (host, kids)
    }

    #[test]
    fn test_virtualize_captures_children() {
        let mut tree = DomTree::new();
        let (host, kids) = host_with_children(&mut tree, 3);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();

        assert_eq!(overlay.virtual_children(host), Some(kids.as_slice()));
        assert!(kids.iter().all(|&k| overlay.virtual_parent(k) == Some(host)));
        // Native structure untouched
        assert_eq!(tree.child_ids(host), kids);
    }

    #[test]
    fn test_double_virtualize_fails() {
        let mut tree = DomTree::new();
        let (host, _) = host_with_children(&mut tree, 1);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();
        assert!(matches!(overlay.virtualize(&tree, host), Err(ShadowError::Hierarchy(_))));
    }

    #[test]
    fn test_insert_at_reference() {
        let mut tree = DomTree::new();
        let (host, kids) = host_with_children(&mut tree, 2);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();

        let extra = tree.create_text("x");
        overlay.insert(&mut tree, host, extra, Some(kids[1])).unwrap();
        assert_eq!(overlay.virtual_children(host).unwrap(), &[kids[0], extra, kids[1]]);
        assert_eq!(overlay.virtual_parent(extra), Some(host));
    }

    #[test]
    fn test_insert_missing_reference() {
        let mut tree = DomTree::new();
        let (host, _) = host_with_children(&mut tree, 1);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();

        let stray = tree.create_text("stray");
        let extra = tree.create_text("x");
        let err = overlay.insert(&mut tree, host, extra, Some(stray)).unwrap_err();
        assert!(matches!(err, ShadowError::NotFound(_)));
        assert_eq!(overlay.virtual_children(host).unwrap().len(), 1);
        assert_eq!(overlay.virtual_parent(extra), None);
    }

    #[test]
    fn test_insert_fragment_expands() {
        let mut tree = DomTree::new();
        let (host, _) = host_with_children(&mut tree, 0);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();

        let frag = tree.create_fragment();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        tree.append_child(frag, a).unwrap();
        tree.append_child(frag, b).unwrap();

        let inserted = overlay.insert(&mut tree, host, frag, None).unwrap();
        assert_eq!(inserted, vec![a, b]);
        assert_eq!(overlay.virtual_children(host).unwrap(), &[a, b]);
        assert_eq!(overlay.virtual_parent(frag), None);
        assert!(tree.child_ids(frag).is_empty());
    }

    #[test]
    fn test_insert_moves_between_parents() {
        let mut tree = DomTree::new();
        let (first, kids) = host_with_children(&mut tree, 2);
        let (second, _) = host_with_children(&mut tree, 0);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, first).unwrap();
        overlay.virtualize(&tree, second).unwrap();

        overlay.insert(&mut tree, second, kids[0], None).unwrap();
        assert_eq!(overlay.virtual_children(first).unwrap(), &[kids[1]]);
        assert_eq!(overlay.virtual_children(second).unwrap(), &[kids[0]]);
        assert_eq!(tree.parent(kids[0]), None);
    }

    #[test]
    fn test_insert_requires_virtual_parent() {
        let mut tree = DomTree::new();
        let plain = tree.create_element("div");
        let t = tree.create_text("t");
        let mut overlay = TreeOverlay::new();
        assert!(matches!(overlay.insert(&mut tree, plain, t, None), Err(ShadowError::Hierarchy(_))));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut tree = DomTree::new();
        let (host, kids) = host_with_children(&mut tree, 3);
        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();

        overlay.remove(&mut tree, host, kids[1]).unwrap();
        assert_eq!(overlay.virtual_children(host).unwrap(), &[kids[0], kids[2]]);
        assert_eq!(overlay.virtual_parent(kids[1]), None);
        assert_eq!(tree.parent(kids[1]), None);

        let err = overlay.remove(&mut tree, host, kids[1]).unwrap_err();
        assert!(matches!(err, ShadowError::NotFound(_)));

        let cleared = overlay.clear(&mut tree, host);
        assert_eq!(cleared, vec![kids[0], kids[2]]);
        assert!(overlay.virtual_children(host).unwrap().is_empty());
        assert!(overlay.is_virtualized(host));
        assert!(tree.child_ids(host).is_empty());
    }
}
